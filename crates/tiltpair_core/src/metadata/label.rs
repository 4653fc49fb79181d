//! Record field labels.

use std::fmt::{Display, Formatter};

/// Field label of a metadata record.
///
/// Unknown labels are kept as `Other` so a read/modify/write cycle does not
/// drop columns written by other tools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Untilted micrograph image path.
    Micrograph,
    /// Tilted micrograph image path.
    MicrographTilted,
    /// Integer x coordinate of a pick.
    XInt,
    /// Integer y coordinate of a pick.
    YInt,
    AngleY,
    AngleY2,
    AngleTilt,
    Other(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Micrograph => "micrograph",
            Self::MicrographTilted => "micrograph_tilted",
            Self::XInt => "xcoor",
            Self::YInt => "ycoor",
            Self::AngleY => "angleY",
            Self::AngleY2 => "angleY2",
            Self::AngleTilt => "angleTilt",
            Self::Other(name) => name.as_str(),
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "micrograph" => Self::Micrograph,
            "micrograph_tilted" => Self::MicrographTilted,
            "xcoor" => Self::XInt,
            "ycoor" => Self::YInt,
            "angleY" => Self::AngleY,
            "angleY2" => Self::AngleY2,
            "angleTilt" => Self::AngleTilt,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Label;

    #[test]
    fn known_labels_roundtrip_through_names() {
        for label in [
            Label::Micrograph,
            Label::MicrographTilted,
            Label::XInt,
            Label::YInt,
            Label::AngleY,
            Label::AngleY2,
            Label::AngleTilt,
        ] {
            assert_eq!(Label::parse(label.as_str()), label);
        }
    }

    #[test]
    fn unknown_label_is_preserved() {
        let label = Label::parse("defocusU");
        assert_eq!(label, Label::Other("defocusU".to_string()));
        assert_eq!(label.to_string(), "defocusU");
    }
}
