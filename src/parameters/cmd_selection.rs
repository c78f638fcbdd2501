//! Colour-magnitude diagram selection in the `"mag,blue-red"` form used by the engine.
use std::{fmt, str::FromStr};

use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::all_consuming,
    sequence::separated_pair,
    IResult, Parser,
};

use crate::ananke_errors::AnankeError;

/// The band used as magnitude axis and the two bands whose difference is the colour axis.
///
/// The engine applies `appMagLimits` to [`magnitude`](Self::magnitude), `absMagLimits` to its
/// absolute counterpart and `colorLimits` to `color_blue - color_red`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdSelection {
    pub magnitude: String,
    pub color_blue: String,
    pub color_red: String,
}

fn band(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.').parse(input)
}

fn cmd(input: &str) -> IResult<&str, (&str, (&str, &str))> {
    all_consuming(separated_pair(
        band,
        char(','),
        separated_pair(band, char('-'), band),
    ))
    .parse(input)
}

impl CmdSelection {
    pub fn new(
        magnitude: impl Into<String>,
        color_blue: impl Into<String>,
        color_red: impl Into<String>,
    ) -> Self {
        CmdSelection {
            magnitude: magnitude.into(),
            color_blue: color_blue.into(),
            color_red: color_red.into(),
        }
    }

    /// Parse `"b1,b2-b3"`; surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, AnankeError> {
        let (_, (magnitude, (blue, red))) = cmd(text.trim()).map_err(|_| {
            AnankeError::InvalidParameter(format!(
                "CMD selection '{text}' is not of the form 'band1,band2-band3'"
            ))
        })?;
        Ok(CmdSelection::new(magnitude, blue, red))
    }

    /// The three bands in `magnitude, blue, red` order.
    pub fn bands(&self) -> [&str; 3] {
        [&self.magnitude, &self.color_blue, &self.color_red]
    }

    /// Check every band against the filters of a photometric system.
    pub fn check_filters<S: AsRef<str>>(
        &self,
        system: &str,
        filters: &[S],
    ) -> Result<(), AnankeError> {
        match self
            .bands()
            .into_iter()
            .find(|band| !filters.iter().any(|f| f.as_ref() == *band))
        {
            Some(band) => Err(AnankeError::InvalidParameter(format!(
                "band '{band}' of CMD selection '{self}' is not a filter of {system}"
            ))),
            None => Ok(()),
        }
    }
}

impl FromStr for CmdSelection {
    type Err = AnankeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CmdSelection::parse(s)
    }
}

impl fmt::Display for CmdSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}-{}", self.magnitude, self.color_blue, self.color_red)
    }
}

#[cfg(test)]
mod test_cmd_selection {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cmd: CmdSelection = " G,G_BP-G_RP ".parse().unwrap();
        assert_eq!(cmd, CmdSelection::new("G", "G_BP", "G_RP"));
        assert_eq!(cmd.to_string(), "G,G_BP-G_RP");
        assert_eq!(cmd.bands(), ["G", "G_BP", "G_RP"]);
    }

    #[test]
    fn test_malformed_selections() {
        for text in ["G", "G,G_BP", "G,-G_RP", "G;G_BP-G_RP", "G,G_BP-G_RP-x", ""] {
            assert!(
                CmdSelection::parse(text).is_err(),
                "'{text}' should be rejected"
            );
        }
    }

    #[test]
    fn test_check_filters() {
        let cmd = CmdSelection::new("rP1", "gP1", "rP1");
        assert!(cmd.check_filters("PS1", &["gP1", "rP1", "iP1"]).is_ok());
        assert_eq!(
            cmd.check_filters("SDSS", &["g", "r"]),
            Err(AnankeError::InvalidParameter(
                "band 'rP1' of CMD selection 'rP1,gP1-rP1' is not a filter of SDSS".into()
            ))
        );
    }
}
