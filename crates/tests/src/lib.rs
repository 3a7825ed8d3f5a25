//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - Contract defaults
//! - Config file -> dispatcher -> transport -> sincedb
//! - Resuming from stored positions

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CallbackPayload, Command, ConfigVersion, ShipperConfig};

    #[test]
    fn test_config_without_version_defaults_to_v1() {
        let config = ConfigLoader::load_from_str(
            "[transport]\nkind = \"stdout\"\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.version, ConfigVersion::V1);
        assert_eq!(ShipperConfig::default().version, ConfigVersion::V1);
    }

    #[test]
    fn test_command_names() {
        let callback = Command::Callback(CallbackPayload::new("a.log", ["x"]));
        assert_eq!(callback.name(), "callback");
        assert_eq!(Command::Exit.name(), "exit");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        CallbackPayload, EventFormat, FileIdentity, SharedConfig, ShipperConfig, TransportConfig,
        TransportKind,
    };
    use dispatcher::{command_queue, create_dispatcher, StopReason};
    use sincedb::SincedbStore;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    fn file_transport_config(out: &Path, sincedb: &Path) -> ShipperConfig {
        ShipperConfig {
            hostname: "e2e-host".into(),
            transport: TransportConfig {
                kind: TransportKind::File,
                format: EventFormat::Raw,
                params: HashMap::from([("path".to_string(), out.display().to_string())]),
            },
            sincedb: contracts::SincedbConfig {
                path: Some(sincedb.to_path_buf()),
                ..Default::default()
            },
            ..ShipperConfig::default()
        }
    }

    /// End-to-end: callback with offset -> FileTransport -> sincedb
    ///
    /// Both lines land once in the output and the store ends at the offset.
    #[tokio::test]
    async fn test_e2e_deliver_and_checkpoint() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("a.log");
        let out = dir.path().join("out.log");
        let db = dir.path().join("sincedb.sqlite3");
        std::fs::write(&log, "x\ny\n").unwrap();

        let config = file_transport_config(&out, &db);
        let store = Arc::new(SincedbStore::new(config.sincedb.path.clone()));
        let (tx, rx) = command_queue(config.queue.capacity);
        let dispatcher = create_dispatcher(SharedConfig::new(config), rx, Arc::clone(&store))
            .await
            .unwrap();
        let handle = dispatcher.spawn(CancellationToken::new());

        let filename = log.to_str().unwrap();
        tx.callback(CallbackPayload::new(filename, ["x", "y"]).with_offset(100))
            .await
            .unwrap();
        tx.exit().await.unwrap();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.reason, StopReason::ExitCommand);
        assert_eq!(outcome.metrics.lines_delivered, 2);
        assert_eq!(outcome.metrics.checkpoints, 1);

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "x\ny\n");
        assert_eq!(store.start_position_for_path(&log).unwrap(), Some(100));
    }

    /// Positions follow the file identity, not its name
    #[cfg(unix)]
    #[tokio::test]
    async fn test_e2e_position_survives_rename() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("app.log");
        let rotated = dir.path().join("app.log.1");
        let out = dir.path().join("out.log");
        let db = dir.path().join("sincedb.sqlite3");
        std::fs::write(&log, "first\n").unwrap();

        let config = file_transport_config(&out, &db);
        let store = Arc::new(SincedbStore::new(config.sincedb.path.clone()));
        let (tx, rx) = command_queue(4);
        let dispatcher = create_dispatcher(SharedConfig::new(config), rx, Arc::clone(&store))
            .await
            .unwrap();
        let handle = dispatcher.spawn(CancellationToken::new());

        tx.callback(CallbackPayload::new(log.to_str().unwrap(), ["first"]).with_offset(6))
            .await
            .unwrap();
        tx.exit().await.unwrap();
        handle.await.unwrap().unwrap();

        let identity = FileIdentity::from_path(&log).unwrap();
        std::fs::rename(&log, &rotated).unwrap();

        // a fresh store on the same file, as a restarted agent would open it
        let reopened = SincedbStore::new(Some(db));
        assert_eq!(reopened.start_position_for_path(&rotated).unwrap(), Some(6));
        assert_eq!(reopened.position_for(identity).unwrap(), Some(6));
        assert!(reopened.start_position_for_path(&log).is_err());
    }

    /// Config text -> loader -> TCP transport with JSON events
    #[tokio::test]
    async fn test_e2e_toml_config_to_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        let toml = format!(
            r#"
hostname = "web-1"

[transport]
kind = "tcp"
format = "json"

[transport.params]
addr = "{addr}"

[[files]]
pattern = "/var/log/nginx/*.log"
fields = {{ service = "nginx" }}
"#
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let shared = SharedConfig::new(config);

        let (tx, rx) = command_queue(8);
        let dispatcher = create_dispatcher(
            shared.clone(),
            rx,
            Arc::new(SincedbStore::disabled()),
        )
        .await
        .unwrap();
        let handle = dispatcher.spawn(CancellationToken::new());

        let filename = "/var/log/nginx/access.log";
        let mut payload = CallbackPayload::new(filename, ["GET /", "", "GET /health"])
            .with_ignore_empty(true);
        payload.fields = shared
            .file_config(filename)
            .map(|file| file.fields)
            .unwrap_or_default();
        tx.callback(payload).await.unwrap();
        tx.exit().await.unwrap();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.metrics.lines_delivered, 2);

        // the transport is dropped with the dispatcher, closing the socket
        let received = server.await.unwrap();
        let events: Vec<serde_json::Value> = received
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["message"], "GET /");
        assert_eq!(events[1]["message"], "GET /health");
        assert_eq!(events[0]["host"], "web-1");
        assert_eq!(events[0]["file"], filename);
        assert_eq!(events[0]["service"], "nginx");
    }

    /// Construction errors surface before the loop starts
    #[tokio::test]
    async fn test_e2e_unreachable_tcp_fails_fast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ShipperConfig {
            transport: TransportConfig {
                kind: TransportKind::Tcp,
                params: HashMap::from([
                    ("addr".to_string(), addr.to_string()),
                    ("connect_timeout_ms".to_string(), "200".to_string()),
                ]),
                ..TransportConfig::default()
            },
            ..ShipperConfig::default()
        };
        ConfigLoader::validate(&config).unwrap();

        let (_tx, rx) = command_queue(1);
        let result = create_dispatcher(
            SharedConfig::new(config),
            rx,
            Arc::new(SincedbStore::disabled()),
        )
        .await;
        assert!(result.is_err());
    }
}
