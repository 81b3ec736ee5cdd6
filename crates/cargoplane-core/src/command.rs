//! `docker run` command rendering.
//!
//! Token order is fixed: flags, `-v` mounts, `--entrypoint`, image, args,
//! then an optional `&& cleanup` tail. Omitted segments leave no stray
//! spaces behind.
//!
//! Nothing is quoted or escaped. Every token is interpolated verbatim, so
//! callers must pre-sanitize anything that comes from untrusted input.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::ordered::OrderedMap;

const DOCKER_RUN: &str = "docker run";

/// Arguments passed to the container after the image.
///
/// A list is rendered space-joined in order. A single string is treated as
/// an already-joined argument line and rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Args {
    List(Vec<String>),
    Line(String),
}

impl Default for Args {
    fn default() -> Self {
        Args::List(Vec::new())
    }
}

impl Args {
    pub fn is_empty(&self) -> bool {
        self.segments().next().is_none()
    }

    fn segments(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Args::List(items) => Box::new(
                items
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty()),
            ),
            Args::Line(line) => Box::new(std::iter::once(line.trim()).filter(|s| !s.is_empty())),
        }
    }
}

impl From<Vec<String>> for Args {
    fn from(items: Vec<String>) -> Self {
        Args::List(items)
    }
}

impl From<Vec<&str>> for Args {
    fn from(items: Vec<&str>) -> Self {
        Args::List(items.into_iter().map(String::from).collect())
    }
}

impl From<&str> for Args {
    fn from(line: &str) -> Self {
        Args::Line(line.to_string())
    }
}

/// Command(s) run on the instance after the container exits.
///
/// A sequence is joined with `&&`. The tail is chained with `&&` as well,
/// so it only runs when `docker run` exits zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cleanup {
    Command(String),
    Sequence(Vec<String>),
}

impl Cleanup {
    /// The shell text appended after `&&`, or `None` when there is nothing to run.
    pub fn to_command(&self) -> Option<String> {
        let joined = match self {
            Cleanup::Command(cmd) => cmd.trim().to_string(),
            Cleanup::Sequence(cmds) => cmds
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" && "),
        };
        (!joined.is_empty()).then_some(joined)
    }
}

impl From<&str> for Cleanup {
    fn from(cmd: &str) -> Self {
        Cleanup::Command(cmd.to_string())
    }
}

impl From<Vec<&str>> for Cleanup {
    fn from(cmds: Vec<&str>) -> Self {
        Cleanup::Sequence(cmds.into_iter().map(String::from).collect())
    }
}

/// The rendered shell command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedCommand(String);

impl RenderedCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// SHA-256 of the command line, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// First 12 hex chars of [`digest`](Self::digest).
    pub fn short_digest(&self) -> String {
        self.digest()[..12].to_string()
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RenderedCommand {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject entrypoints with whitespace; docker would read the second word as the image.
pub fn check_entrypoint(entrypoint: &str) -> Result<(), ValidationError> {
    if entrypoint.chars().any(char::is_whitespace) {
        return Err(ValidationError::EntrypointWhitespace {
            entrypoint: entrypoint.to_string(),
        });
    }
    Ok(())
}

/// Render a `docker run` command line.
///
/// An empty entrypoint counts as unset. Fails only when the entrypoint
/// contains whitespace.
pub fn render(
    image: &str,
    entrypoint: Option<&str>,
    args: &Args,
    docker_flags: &[String],
    container_mounts: &OrderedMap<String>,
    cleanup: Option<&Cleanup>,
) -> Result<RenderedCommand, ValidationError> {
    let entrypoint = entrypoint.filter(|e| !e.is_empty());
    if let Some(entrypoint) = entrypoint {
        check_entrypoint(entrypoint)?;
    }

    let mut segments: Vec<String> = vec![DOCKER_RUN.to_string()];
    segments.extend(docker_flags.iter().map(|flag| flag.trim().to_string()));
    segments.extend(
        container_mounts
            .iter()
            .map(|(host, container)| format!("-v {host}:{container}")),
    );
    if let Some(entrypoint) = entrypoint {
        segments.push(format!("--entrypoint {entrypoint}"));
    }
    segments.push(image.trim().to_string());
    segments.extend(args.segments().map(str::to_string));

    let mut line = segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(cleanup) = cleanup.and_then(Cleanup::to_command) {
        line.push_str(" && ");
        line.push_str(&cleanup);
    }

    Ok(RenderedCommand(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_mounts() -> OrderedMap<String> {
        OrderedMap::new()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_image_only() {
        let cmd = render("test", None, &Args::default(), &[], &no_mounts(), None).unwrap();
        assert_eq!(cmd.as_str(), "docker run test");
    }

    #[test]
    fn test_entrypoint_override() {
        let cmd = render(
            "test",
            Some("entry_ovrd"),
            &Args::default(),
            &[],
            &no_mounts(),
            None,
        )
        .unwrap();
        assert_eq!(cmd.as_str(), "docker run --entrypoint entry_ovrd test");
    }

    #[test]
    fn test_entrypoint_with_whitespace_rejected() {
        for ep in ["python app.py", "run\tme", "a\nb"] {
            let err = render("img", Some(ep), &Args::default(), &[], &no_mounts(), None)
                .unwrap_err();
            assert!(matches!(err, ValidationError::EntrypointWhitespace { .. }));
        }
    }

    #[test]
    fn test_empty_entrypoint_is_unset() {
        let cmd = render("img", Some(""), &Args::default(), &[], &no_mounts(), None).unwrap();
        assert_eq!(cmd.as_str(), "docker run img");
    }

    #[test]
    fn test_cleanup_without_args_has_single_spaces() {
        let cleanup = Cleanup::from("rm -rf /tmp/x");
        let cmd = render("img", None, &Args::default(), &[], &no_mounts(), Some(&cleanup)).unwrap();
        assert_eq!(cmd.as_str(), "docker run img && rm -rf /tmp/x");
    }

    #[test]
    fn test_cleanup_sequence_joined_with_and() {
        let cleanup = Cleanup::Sequence(strings(&["sync", "", "shutdown now"]));
        assert_eq!(cleanup.to_command().unwrap(), "sync && shutdown now");
        assert_eq!(Cleanup::Sequence(vec![]).to_command(), None);
        assert_eq!(Cleanup::from("  ").to_command(), None);
    }

    #[test]
    fn test_args_line_is_verbatim() {
        let args = Args::Line("--epochs 10  --lr 0.1".into());
        let cmd = render("trainer", None, &args, &[], &no_mounts(), None).unwrap();
        assert_eq!(cmd.as_str(), "docker run trainer --epochs 10  --lr 0.1");
    }

    #[test]
    fn test_blank_flags_leave_no_gaps() {
        let flags = strings(&["", " --rm ", ""]);
        let args = Args::List(strings(&["", "a"]));
        let cmd = render("img", None, &args, &flags, &no_mounts(), None).unwrap();
        assert_eq!(cmd.as_str(), "docker run --rm img a");
    }

    #[test]
    fn test_digest_is_stable() {
        let a = render("img", None, &Args::default(), &[], &no_mounts(), None).unwrap();
        let b = render("img", None, &Args::default(), &[], &no_mounts(), None).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_eq!(a.short_digest().len(), 12);
    }
}
