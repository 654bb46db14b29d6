//! Update candidates and the update filename grammar
//!
//! An update file is named `<ServiceName> V<Version><Ext>`, optionally
//! suffixed `.old` once applied, e.g. `MyApp.Sensor V3.1021.CDEX`. The
//! service name may itself contain spaces; the version is always the last
//! space-delimited token.

use crate::version::PackageVersion;
use crate::{OLD_SUFFIX, SOURCE_LIST_SEPARATOR};
use std::path::{Path, PathBuf};

/// One update file found by a scan, with its parsed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full path of the update file.
    pub path: PathBuf,
    /// Service name parsed from the filename.
    pub service_name: String,
    /// Version parsed from the filename.
    pub version: PackageVersion,
    /// True when the file carries the legacy auxiliary extension.
    pub auxiliary: bool,
}

impl Candidate {
    /// Parse a candidate from a path, given the configured update extension
    /// and the legacy auxiliary extension (both with leading dot). Returns
    /// `None` for anything that does not match the filename grammar; callers
    /// drop such files silently.
    #[must_use]
    pub fn parse(path: &Path, update_ext: &str, auxiliary_ext: &str) -> Option<Self> {
        let name = path.file_name()?.to_str()?;

        let name = strip_suffix_ignore_case(name, OLD_SUFFIX).unwrap_or(name);

        let (stem, auxiliary) = if let Some(stem) = strip_suffix_ignore_case(name, update_ext) {
            (stem, false)
        } else if let Some(stem) = strip_suffix_ignore_case(name, auxiliary_ext) {
            (stem, true)
        } else {
            return None;
        };

        let tokens: Vec<&str> = stem.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.len() < 2 {
            return None;
        }

        let version_token = tokens[tokens.len() - 1];
        let version = PackageVersion::parse(version_token).ok()?;
        let service_name = tokens[..tokens.len() - 1].join(" ");

        Some(Self {
            path: path.to_path_buf(),
            service_name,
            version,
            auxiliary,
        })
    }
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(suffix) {
        Some(&s[..split])
    } else {
        None
    }
}

/// Why a candidate was accepted or rejected by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Update for the node's own product.
    AcceptedOwnUpdate,
    /// Update for an installed plugin; its pending-version marker was set.
    AcceptedPluginUpdate,
    /// Well-formed name with no installed counterpart.
    AcceptedNewPlugin,
    /// Version is not newer than what is running or installed.
    RejectedNotNewer { current: PackageVersion },
}

impl CandidateOutcome {
    /// Whether the candidate entered the accepted set.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::RejectedNotNewer { .. })
    }
}

/// The accepted result of one scan cycle: an ordered set of candidates plus
/// the version associated with the run (the most recently accepted one).
#[derive(Debug, Clone, Default)]
pub struct AcceptedUpdates {
    candidates: Vec<Candidate>,
    version: Option<PackageVersion>,
}

impl AcceptedUpdates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset at the start of a scan cycle.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.version = None;
    }

    /// Record an accepted candidate. In single-slot mode (`accumulate` off)
    /// the new candidate replaces any previous result, except that a lower
    /// version never displaces a higher one already held for the same
    /// service; in accumulate mode it is appended, order preserved.
    pub fn accept(&mut self, candidate: Candidate, accumulate: bool) {
        if !accumulate {
            if let Some(held) = self.candidates.first() {
                if held.service_name.eq_ignore_ascii_case(&candidate.service_name)
                    && candidate.version < held.version
                {
                    return;
                }
            }
            self.candidates.clear();
        }
        self.version = Some(candidate.version);
        self.candidates.push(candidate);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Version associated with the run, if anything was accepted.
    #[must_use]
    pub fn version(&self) -> Option<PackageVersion> {
        self.version
    }

    /// Paths of the accepted candidates, in acceptance order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.path.clone()).collect()
    }

    /// Helper-argument form of the accepted paths.
    #[must_use]
    pub fn source_list(&self) -> String {
        let parts: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.path.display().to_string())
            .collect();
        parts.join(SOURCE_LIST_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT: &str = ".CDEX";
    const AUX: &str = ".CDEF";

    fn parse(name: &str) -> Option<Candidate> {
        Candidate::parse(Path::new(name), EXT, AUX)
    }

    #[test]
    fn parses_service_and_version() {
        let c = parse("/updates/Foo.Bar V2.5.CDEX").unwrap();
        assert_eq!(c.service_name, "Foo.Bar");
        assert_eq!(c.version, PackageVersion::parse("2.5").unwrap());
        assert!(!c.auxiliary);
    }

    #[test]
    fn parses_spaced_service_names() {
        let c = parse("My Sensor Hub V1.33.CDEX").unwrap();
        assert_eq!(c.service_name, "My Sensor Hub");
        assert_eq!(c.version.to_string(), "1.33");
    }

    #[test]
    fn parses_auxiliary_and_old() {
        let aux = parse("Foo.Bar V2.5.cdef").unwrap();
        assert!(aux.auxiliary);

        let old = parse("Foo.Bar V2.5.CDEX.old").unwrap();
        assert_eq!(old.service_name, "Foo.Bar");
        assert!(!old.auxiliary);
    }

    #[test]
    fn rejects_versionless_names() {
        assert!(parse("FooBar.CDEX").is_none());
        assert!(parse("Foo.Bar Vnope.CDEX").is_none());
        assert!(parse("META.CDEX").is_none());
        assert!(parse("Foo.Bar V2.5.zip").is_none());
    }

    #[test]
    fn single_slot_keeps_last_accepted() {
        let mut set = AcceptedUpdates::new();
        set.accept(parse("A V1.0.CDEX").unwrap(), false);
        set.accept(parse("B V2.0.CDEX").unwrap(), false);
        assert_eq!(set.len(), 1);
        assert_eq!(set.candidates()[0].service_name, "B");
        assert_eq!(set.version(), Some(PackageVersion::parse("2.0").unwrap()));
    }

    #[test]
    fn single_slot_same_service_never_downgrades() {
        let mut set = AcceptedUpdates::new();
        set.accept(parse("App V10.0.CDEX").unwrap(), false);
        set.accept(parse("app V9.0.CDEX").unwrap(), false);
        assert_eq!(set.len(), 1);
        assert_eq!(set.version(), Some(PackageVersion::parse("10.0").unwrap()));

        // A different service still takes the slot, and a higher version of
        // the same service still moves it forward.
        set.accept(parse("Other V1.0.CDEX").unwrap(), false);
        assert_eq!(set.candidates()[0].service_name, "Other");
        set.accept(parse("Other V2.0.CDEX").unwrap(), false);
        assert_eq!(set.version(), Some(PackageVersion::parse("2.0").unwrap()));
    }

    #[test]
    fn accumulate_preserves_order() {
        let mut set = AcceptedUpdates::new();
        set.accept(parse("A V1.0.CDEX").unwrap(), true);
        set.accept(parse("B V2.0.CDEX").unwrap(), true);
        assert_eq!(set.len(), 2);
        assert_eq!(set.source_list(), "A V1.0.CDEX;:;B V2.0.CDEX");
    }
}
