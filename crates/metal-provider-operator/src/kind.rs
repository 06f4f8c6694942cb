use std::{collections::BTreeSet, fmt, str::FromStr};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};

/// Managed kinds this operator can run a controller for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Kind {
    Device,
    Project,
    SshKey,
    VirtualNetwork,
    SpotMarketRequest,
    PortAssignment,
}

/// Comma separated set of kinds, e.g. `device,ssh_key`.
#[derive(Clone, PartialEq, Eq)]
pub struct Kinds(BTreeSet<Kind>);

impl Kinds {
    pub fn iter(&self) -> impl Iterator<Item = Kind> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Kinds {
    fn default() -> Self {
        Self(Kind::iter().collect())
    }
}

impl FromStr for Kinds {
    type Err = strum::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim() == "all" {
            return Ok(Self::default());
        }

        value
            .split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .map(Kind::from_str)
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl fmt::Debug for Kinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter().map(ToString::to_string)).finish()
    }
}
