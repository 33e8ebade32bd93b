// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Named style capabilities and their terminal encoding.

use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};

/// Every style the dashboard can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleCap {
    None,
    Tier1,
    Tier2,
    Tier3,
    Overload,
    GpuActive,
    Reset,
    Blink,
    BoldUnderline,
}

/// How style capabilities are written to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// ANSI escape sequences
    Ansi,
    /// No escape sequences at all
    Plain,
}

impl Palette {
    /// Plain when asked for or when `NO_COLOR` is set to a non-empty value
    pub fn detect(no_color: bool) -> Self {
        let env_no_color = std::env::var("NO_COLOR")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if no_color || env_no_color {
            Palette::Plain
        } else {
            Palette::Ansi
        }
    }

    pub fn encode(self, cap: StyleCap) -> String {
        if self == Palette::Plain {
            return String::new();
        }
        match cap {
            StyleCap::None => String::new(),
            StyleCap::Tier1 => background(Color::DarkGreen, Color::Black),
            StyleCap::Tier2 => background(Color::DarkYellow, Color::Black),
            StyleCap::Tier3 => background(Color::DarkRed, Color::White),
            StyleCap::Overload => format!(
                "{}{}",
                self.encode(StyleCap::Blink),
                background(Color::DarkMagenta, Color::White)
            ),
            StyleCap::GpuActive => background(Color::DarkCyan, Color::Black),
            StyleCap::Reset => SetAttribute(Attribute::Reset).to_string(),
            StyleCap::Blink => SetAttribute(Attribute::SlowBlink).to_string(),
            StyleCap::BoldUnderline => format!(
                "{}{}",
                SetAttribute(Attribute::Bold),
                SetAttribute(Attribute::Underlined)
            ),
        }
    }

    /// `text` wrapped in `cap` and a trailing reset
    pub fn paint(self, text: &str, cap: StyleCap) -> String {
        if cap == StyleCap::None {
            return text.to_string();
        }
        format!("{}{}{}", self.encode(cap), text, self.encode(StyleCap::Reset))
    }
}

fn background(bg: Color, fg: Color) -> String {
    format!("{}{}", SetBackgroundColor(bg), SetForegroundColor(fg))
}

/// Color tier of a displayed load.
///
/// With `u = (max_cpus / 2) / 3`: zero is unstyled, `(0, u]`, `(u, 2u]` and
/// `(2u, 3u]` map to the three tiers (upper bound inclusive), anything higher
/// is an overload.
pub fn load_tier(load: u32, max_cpus: u32) -> StyleCap {
    let unit = (max_cpus / 2) / 3;
    match load {
        0 => StyleCap::None,
        l if l <= unit => StyleCap::Tier1,
        l if l <= unit * 2 => StyleCap::Tier2,
        l if l <= unit * 3 => StyleCap::Tier3,
        _ => StyleCap::Overload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        // max 160 => unit 26
        assert_eq!(load_tier(0, 160), StyleCap::None);
        assert_eq!(load_tier(1, 160), StyleCap::Tier1);
        assert_eq!(load_tier(26, 160), StyleCap::Tier1);
        assert_eq!(load_tier(27, 160), StyleCap::Tier2);
        assert_eq!(load_tier(52, 160), StyleCap::Tier2);
        assert_eq!(load_tier(53, 160), StyleCap::Tier3);
        assert_eq!(load_tier(78, 160), StyleCap::Tier3);
        assert_eq!(load_tier(79, 160), StyleCap::Overload);
        assert_eq!(load_tier(500, 160), StyleCap::Overload);
    }

    #[test]
    fn test_plain_palette_is_empty() {
        for cap in [
            StyleCap::Tier1,
            StyleCap::Overload,
            StyleCap::GpuActive,
            StyleCap::Reset,
            StyleCap::BoldUnderline,
        ] {
            assert_eq!(Palette::Plain.encode(cap), "");
        }
        assert_eq!(Palette::Plain.paint("x", StyleCap::Tier3), "x");
    }

    #[test]
    fn test_ansi_palette_encodings() {
        assert_eq!(Palette::Ansi.encode(StyleCap::None), "");
        assert_eq!(Palette::Ansi.encode(StyleCap::Reset), "\x1b[0m");
        assert!(Palette::Ansi.encode(StyleCap::Overload).starts_with(&Palette::Ansi.encode(StyleCap::Blink)));
        assert_ne!(
            Palette::Ansi.encode(StyleCap::Tier1),
            Palette::Ansi.encode(StyleCap::Tier2)
        );

        let painted = Palette::Ansi.paint("GPU1", StyleCap::GpuActive);
        assert!(painted.starts_with('\x1b'));
        assert!(painted.contains("GPU1"));
        assert!(painted.ends_with("\x1b[0m"));
        assert_eq!(Palette::Ansi.paint("idle", StyleCap::None), "idle");
    }
}
