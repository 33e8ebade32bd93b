// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Fixed-width cluster table: one row per node with a CPU load bar and GPU cells.
//!
//! ```text
//! |-------|-------|-------...|*****|------|------|-------|
//! | nodes | 1....CPUS....160     | 1..GPUS..4  | nodes |
//! | hal01 | alice 201, bob 202 ...----| GPU1 | GPU2 | hal01 |
//! ```

use std::collections::BTreeSet;
use std::fmt::Write;

use super::style::{load_tier, Palette, StyleCap};
use crate::config::ClusterConfig;
use crate::slurm::{ClusterSnapshot, JobIndex, NodeUtilization};

/// A `|` tick every this many bar cells in the divider
const TICK_WIDTH: usize = 8;
const NODES_LABEL: &str = "nodes";
const ELLIPSIS: &str = "...";

/// Column widths, derived once from the cluster config
#[derive(Debug, Clone, Copy)]
struct Geometry {
    /// Node name plus one space on each side
    name_col: usize,
    /// Load cells; the bar column is one wider
    bar_cells: usize,
    gap: usize,
    gpus: usize,
    gpu_digits: usize,
}

impl Geometry {
    fn new(cluster: &ClusterConfig, names: &[String]) -> Self {
        let longest = names.iter().map(|n| n.chars().count()).max().unwrap_or(0);
        Self {
            name_col: longest.max(NODES_LABEL.len()) + 2,
            bar_cells: (cluster.max_cpus / 2) as usize,
            gap: cluster.gap_width,
            gpus: cluster.gpus_per_node,
            gpu_digits: cluster.gpus_per_node.to_string().len(),
        }
    }

    /// Characters in " GPUn "
    fn gpu_cell(&self) -> usize {
        5 + self.gpu_digits
    }

    /// Every GPU cell with its trailing `|`
    fn gpu_block(&self) -> usize {
        self.gpus * (self.gpu_cell() + 1)
    }

    /// Longest message that fits between the bar's padding cells
    fn message_budget(&self) -> usize {
        self.bar_cells.saturating_sub(1)
    }

    fn row_width(&self) -> usize {
        2 * self.name_col + self.bar_cells + self.gap + self.gpu_block() + 5
    }
}

/// Renders the node table for one snapshot
pub struct Dashboard<'a> {
    cluster: &'a ClusterConfig,
    palette: Palette,
    hide_names: bool,
    /// When non-empty, only these users appear in the bar messages, with their usage
    allowed_users: &'a BTreeSet<String>,
    geometry: Geometry,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        cluster: &'a ClusterConfig,
        palette: Palette,
        hide_names: bool,
        allowed_users: &'a BTreeSet<String>,
    ) -> Self {
        let geometry = Geometry::new(cluster, &cluster.node_names());
        Self {
            cluster,
            palette,
            hide_names,
            allowed_users,
            geometry,
        }
    }

    /// Full table plus legend
    pub fn render(&self, snapshot: &ClusterSnapshot) -> String {
        let divider = self.divider();
        let mut out = String::new();

        out.push_str(&divider);
        out.push('\n');
        out.push_str(&self.header());
        out.push('\n');
        out.push_str(&divider);
        out.push('\n');

        for node in snapshot.nodes.iter() {
            out.push_str(&self.row(node, &snapshot.jobs));
            out.push('\n');
            out.push_str(&divider);
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.legend());
        out
    }

    /// Horizontal separator, exactly as wide as a row
    fn divider(&self) -> String {
        let g = &self.geometry;
        let mut s = String::with_capacity(g.row_width());
        s.push('|');
        s.push_str(&"-".repeat(g.name_col));
        s.extend((0..g.bar_cells).map(|i| if i % TICK_WIDTH == 0 { '|' } else { '-' }));
        s.push('|');
        s.push_str(&"*".repeat(g.gap + 1));
        s.push('|');
        for _ in 0..g.gpus {
            s.push_str(&"-".repeat(g.gpu_cell()));
            s.push('|');
        }
        s.push_str(&"-".repeat(g.name_col));
        s.push('|');
        s
    }

    fn header(&self) -> String {
        let g = &self.geometry;
        let nodes = format!("{:^width$}", NODES_LABEL, width = g.name_col);

        let cpu_scale = format!(
            " {}{}",
            spread(&["1".to_string(), "CPUS".to_string(), self.cluster.max_cpus.to_string()], g.bar_cells),
            " ".repeat(g.gap)
        );

        let mut s = format!("|{}|{}|", nodes, cpu_scale);
        if g.gpus > 0 {
            let inner = g.gpu_block().saturating_sub(3);
            s.push_str(&format!(
                " {} |",
                spread(&["1".to_string(), "GPUS".to_string(), g.gpus.to_string()], inner)
            ));
        }
        s.push_str(&nodes);
        s.push('|');
        s
    }

    /// Displayed load of a node (hardware threads folded into cores)
    fn load(&self, node: &NodeUtilization) -> u32 {
        node.cpus / self.cluster.load_divisor
    }

    fn row(&self, node: &NodeUtilization, jobs: &JobIndex) -> String {
        let g = &self.geometry;
        let load = self.load(node);
        let max = self.cluster.max_cpus;

        let name_style = load_tier(load, max);
        let name_cell = format!(
            " {} ",
            self.palette.paint(&format!("{:<width$}", node.name, width = g.name_col - 2), name_style)
        );

        let fill = load.min(max);
        let bar_style = if load > max {
            StyleCap::Overload
        } else {
            load_tier(fill, max)
        };
        let message = if self.hide_names {
            String::new()
        } else {
            self.message(node, jobs)
        };
        let bar = self.overlay(&message, fill as usize, bar_style);

        let mut s = String::new();
        let _ = write!(s, "|{}|{}{}|", name_cell, bar, "-".repeat(g.gap));
        for (slot, &used) in node.gpu_occupancy.iter().enumerate().take(g.gpus) {
            let label = format!(" GPU{:<width$} ", slot + 1, width = g.gpu_digits);
            let style = if used { StyleCap::GpuActive } else { StyleCap::None };
            let _ = write!(s, "{}|", self.palette.paint(&label, style));
        }
        let _ = write!(s, "{}|", name_cell);
        s
    }

    /// `user jobid, ` per running job, or with usage for allowed users only
    fn message(&self, node: &NodeUtilization, jobs: &JobIndex) -> String {
        let mut msg = String::new();
        for (job_id, user) in &node.job_users {
            if self.allowed_users.is_empty() {
                let _ = write!(msg, "{} {}, ", user, job_id);
            } else if self.allowed_users.contains(user) {
                let (cpus, gpus) = jobs.get(*job_id).map_or((0, 0), |j| (j.cpus, j.gpus));
                let _ = write!(msg, "{} {} c:{} g:{}, ", user, job_id, cpus, gpus);
            }
        }
        msg
    }

    /// Lay `message` over the bar and switch from `style` back to default at `fill`.
    ///
    /// The bar is `bar_cells + 1` wide: a padding cell, the message area, a
    /// padding cell. When `fill` lies past the bar, the reset goes at the end.
    fn overlay(&self, message: &str, fill: usize, style: StyleCap) -> String {
        let budget = self.geometry.message_budget();
        let width = self.geometry.bar_cells + 1;

        let text: Vec<char> = if message.chars().count() > budget {
            message
                .chars()
                .take(budget.saturating_sub(ELLIPSIS.len()))
                .chain(ELLIPSIS.chars())
                .collect()
        } else {
            message.chars().collect()
        };

        let mut cells = vec![' '; width];
        for (i, c) in text.into_iter().enumerate() {
            cells[i + 1] = c;
        }

        let reset = self.palette.encode(StyleCap::Reset);
        let mut out = self.palette.encode(style);
        for (i, c) in cells.into_iter().enumerate() {
            if i == fill {
                out.push_str(&reset);
            }
            out.push(c);
        }
        if fill >= width {
            out.push_str(&reset);
        }
        out
    }

    fn legend(&self) -> String {
        let p = self.palette;
        let swatch = |cap| p.paint("  ", cap);
        format!(
            "Legend: {}->{}->{} means lower to higher usage and {} means above expected usage.\n        \
             Whereas {} means that a GPU is being {}.\n",
            swatch(StyleCap::Tier1),
            swatch(StyleCap::Tier2),
            swatch(StyleCap::Tier3),
            swatch(StyleCap::Overload),
            swatch(StyleCap::GpuActive),
            p.paint("USED", StyleCap::BoldUnderline),
        )
    }
}

/// Lay `labels` out across `width` characters, joined by dot runs.
///
/// Falls back to the centered middle label when they do not all fit.
fn spread(labels: &[String], width: usize) -> String {
    let text: usize = labels.iter().map(|l| l.chars().count()).sum();
    let gaps = labels.len().saturating_sub(1);
    if gaps == 0 || text + gaps > width {
        let label = labels.get(labels.len() / 2).map(String::as_str).unwrap_or("");
        return format!("{:^w$.w$}", label, w = width);
    }

    let dots = width - text;
    let mut out = String::with_capacity(width);
    for (i, label) in labels.iter().enumerate() {
        out.push_str(label);
        if i < gaps {
            let run = dots / gaps + usize::from(i < dots % gaps);
            out.push_str(&".".repeat(run));
        }
    }
    out
}
