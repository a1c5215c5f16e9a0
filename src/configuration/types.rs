use serde::Deserialize;

/// Which execution backend console sessions should use.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Check for the container tool at startup and fall back to demo mode when it is missing.
    #[default]
    Auto,
    /// Always spawn real shells through the container tool.
    Lxc,
    /// Always use the in-memory demo shell.
    Demo,
}
