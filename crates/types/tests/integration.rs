//! Integration tests for types

#[cfg(test)]
mod tests {
    use ism_types::{
        AcceptedUpdates, ActivityGuard, Candidate, HostingType, PackageVersion, Phase,
        UpdaterInvocation,
    };
    use std::path::Path;

    #[test]
    fn scan_to_invocation_flow() {
        let ext = ".CDEX";
        let aux = ".CDEF";
        let core = Candidate::parse(Path::new("/u/App.Core V2.0.CDEX"), ext, aux).unwrap();
        let extra = Candidate::parse(Path::new("/u/App.Extra V1.1.cdef"), ext, aux).unwrap();
        assert!(extra.auxiliary);

        let mut accepted = AcceptedUpdates::new();
        accepted.accept(core, true);
        accepted.accept(extra, true);
        assert_eq!(
            accepted.version(),
            Some(PackageVersion::parse("1.1").unwrap())
        );

        let invocation = UpdaterInvocation {
            source_files: accepted.paths(),
            target_dir: "/srv/node".into(),
            caller: UpdaterInvocation::caller_identity(4242, "ismd"),
            hosting: HostingType::Iis,
        };
        assert_eq!(
            invocation.source_list(),
            "/u/App.Core V2.0.CDEX;:;/u/App.Extra V1.1.cdef"
        );
        assert_eq!(
            UpdaterInvocation::split_source_list(&invocation.source_list()),
            invocation.source_files
        );
        assert_eq!(
            invocation.hosting.adjust_target_dir(&invocation.target_dir),
            Path::new("/srv/node/bin")
        );
    }

    #[test]
    fn guard_is_single_flight_across_threads() {
        let guard = ActivityGuard::new();
        let winner = guard.try_begin(Phase::Launching);
        assert!(winner.is_some());

        let clone = guard.clone();
        let loser = std::thread::spawn(move || clone.try_begin(Phase::Launching).is_some())
            .join()
            .unwrap();
        assert!(!loser);

        drop(winner);
        assert_eq!(guard.current(), Phase::Idle);
    }
}
