//! Integration tests for events

#[cfg(test)]
mod tests {
    use ism_events::{channel, AppEvent, EventEmitter, EventSender, GeneralEvent, ScanEvent, UpdateEvent};
    use ism_types::PackageVersion;

    #[tokio::test]
    async fn emit_helpers_deliver_events() {
        let (tx, mut rx) = channel();

        tx.emit_debug("probing");
        tx.emit(AppEvent::Scan(ScanEvent::Started { root: "/u".into() }));

        match rx.recv().await.unwrap() {
            AppEvent::General(GeneralEvent::DebugLog { message }) => {
                assert_eq!(message, "probing");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::Scan(_)));
    }

    #[test]
    fn absent_sender_drops_silently() {
        let sender: Option<EventSender> = None;
        sender.emit_warning("nobody listening");
    }

    #[test]
    fn closed_channel_drops_silently() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_error("receiver gone");
    }

    #[test]
    fn events_serialize_with_domain_tags() {
        let event = AppEvent::Update(UpdateEvent::Available {
            version: PackageVersion::parse("2.5").unwrap(),
            paths: vec!["/u/App V2.5.CDEX".into()],
        });
        assert_eq!(event.domain(), "update");
        assert_eq!(event.log_level(), tracing::Level::INFO);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"domain\":\"update\""));
        assert!(json.contains("\"type\":\"Available\""));
    }
}
