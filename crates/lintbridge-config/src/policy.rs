//! Policy applied when a client connects while another session is active.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the service treats a connection arriving while a session is active.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionPolicy {
    /// Refuse the newcomer with an error message and keep the active session.
    #[default]
    Reject,
    /// Shut the active session down and hand the service to the newcomer.
    Replace,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("reject", ConnectionPolicy::Reject)]
    #[case("REPLACE", ConnectionPolicy::Replace)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: ConnectionPolicy) {
        assert_eq!(ConnectionPolicy::from_str(input).expect("parse"), expected);
    }

    #[rstest]
    fn displays_in_snake_case() {
        assert_eq!(ConnectionPolicy::Replace.to_string(), "replace");
    }
}
