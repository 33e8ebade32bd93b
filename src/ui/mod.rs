// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

pub mod dashboard;
pub mod drilldown;
pub mod style;

pub use dashboard::Dashboard;
pub use style::Palette;
