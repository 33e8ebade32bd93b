// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm integration: fetch the `scontrol show job` dump, split it into frames,
//! and index the extracted jobs by id and by node.

pub mod index;
pub mod parser;
pub mod slurm;
pub mod types;

pub use index::{ClusterSnapshot, JobIndex, NodeIndex};
pub use slurm::{CommandDiagnostics, CommandSource, NodeDiagnostics, StatusSource};
pub use types::NodeUtilization;
