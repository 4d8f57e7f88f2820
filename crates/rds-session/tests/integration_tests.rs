//! Integration tests for RDS client sessions
//!
//! These tests drive complete sessions over in-memory pipes and real TCP
//! sockets, covering:
//! - Command replies and frequency range handling
//! - Band-edge wraparound for UP/DOWN
//! - Group assembly, resynchronization and corrupted block markers
//! - Session termination (QUIT, client close, tuner failure)
//! - Concurrent sessions sharing one tuner

use std::net::SocketAddr;
use std::time::Duration;

use rds_protocol::{BlockPosition, BlockQuality, RawBlock, Reply};
use rds_session::{
    interpret_line, EndReason, Outcome, Server, ServerConfig, Session, SessionConfig,
    SessionError, SessionSummary,
};
use rds_sim::{blocks_to_bytes, SimulatedSource, VirtualTuner};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// A session running on in-memory pipes
    pub struct Harness {
        /// Test side of the device stream
        pub device: DuplexStream,
        /// Test side of the client connection
        pub client: BufReader<DuplexStream>,
        pub tuner: VirtualTuner,
        pub task: JoinHandle<Result<SessionSummary, SessionError>>,
    }

    pub fn start(tuner: VirtualTuner) -> Harness {
        start_with(tuner, SessionConfig::default())
    }

    pub fn start_with(tuner: VirtualTuner, config: SessionConfig) -> Harness {
        let (device, session_device) = tokio::io::duplex(1024);
        let (client, session_client) = tokio::io::duplex(1024);
        let session = Session::new(session_device, session_client, tuner.clone(), config);

        Harness {
            device,
            client: BufReader::new(client),
            tuner,
            task: tokio::spawn(session.run()),
        }
    }

    impl Harness {
        pub async fn send(&mut self, line: &str) {
            self.client.write_all(line.as_bytes()).await.unwrap();
            self.client.flush().await.unwrap();
        }

        /// Next line from the session, without its terminator; `None` on EOF
        pub async fn line(&mut self) -> Option<String> {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(5), self.client.read_line(&mut line))
                .await
                .expect("timed out waiting for session output")
                .unwrap();
            (n > 0).then(|| line.trim_end_matches('\n').to_string())
        }

        pub async fn command(&mut self, line: &str) -> String {
            self.send(&format!("{}\n", line)).await;
            self.line().await.expect("session closed before replying")
        }

        pub async fn feed(&mut self, blocks: &[RawBlock]) {
            self.device.write_all(&blocks_to_bytes(blocks)).await.unwrap();
        }
    }

    pub fn block(payload: u16, position: BlockPosition) -> RawBlock {
        RawBlock::new(payload, position, BlockQuality::Clean)
    }

    pub fn clean_group() -> [RawBlock; 4] {
        [
            block(0x1234, BlockPosition::A),
            block(0x5678, BlockPosition::B),
            block(0x9ABC, BlockPosition::C),
            block(0xDEF0, BlockPosition::D),
        ]
    }

    /// Read lines until the next command reply
    pub async fn next_reply(reader: &mut BufReader<TcpStream>) -> String {
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
                .await
                .expect("timed out waiting for reply")
                .unwrap();
            assert!(n > 0, "connection closed before reply");
            if line.starts_with('%') {
                return line.trim_end().to_string();
            }
        }
    }

    /// Read lines until a group line arrives
    pub async fn next_group(reader: &mut BufReader<TcpStream>) -> String {
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
                .await
                .expect("timed out waiting for group")
                .unwrap();
            assert!(n > 0, "connection closed before group");
            if !line.starts_with('%') {
                return line.trim_end().to_string();
            }
        }
    }

    pub struct RunningServer {
        pub addr: SocketAddr,
        pub tuner: VirtualTuner,
        pub shutdown: oneshot::Sender<()>,
        pub task: JoinHandle<std::io::Result<()>>,
    }

    pub async fn start_server() -> RunningServer {
        let tuner = VirtualTuner::default();
        let source = SimulatedSource::new(tuner.clone())
            .with_group_interval(Duration::from_millis(5));
        let config = ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };

        let server = Server::new(config, source);
        let listener = server.bind().unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        RunningServer {
            addr,
            tuner,
            shutdown,
            task,
        }
    }

    pub async fn connect(addr: SocketAddr) -> BufReader<TcpStream> {
        BufReader::new(TcpStream::connect(addr).await.unwrap())
    }
}

use helpers::*;

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_set_freq_band_edges() {
        let mut h = start(VirtualTuner::default());

        assert_eq!(h.command("SET_FREQ 87500").await, "% Freq: 87500");
        assert_eq!(h.command("SET_FREQ 108000").await, "% Freq: 108000");
        assert_eq!(h.tuner.frequency_khz(), 108_000);
    }

    #[tokio::test]
    async fn test_set_freq_rejects_without_retuning() {
        let mut h = start(VirtualTuner::default());
        h.command("SET_FREQ 93500").await;

        assert_eq!(h.command("SET_FREQ 87550").await, "% Invalid frequency: 87550");
        assert_eq!(h.command("SET_FREQ 108100").await, "% Invalid frequency: 108100");
        assert_eq!(
            h.command("SET_FREQ").await,
            "% Command FREQ requires one argument."
        );
        assert_eq!(h.tuner.frequency_khz(), 93_500);
    }

    #[tokio::test]
    async fn test_up_down_wraparound() {
        let mut h = start(VirtualTuner::default());

        h.command("SET_FREQ 108000").await;
        assert_eq!(h.command("UP").await, "% Freq: 87500");
        assert_eq!(h.command("DOWN").await, "% Freq: 108000");
        assert_eq!(h.command("DOWN").await, "% Freq: 107900");
    }

    #[tokio::test]
    async fn test_seek_id_and_signal() {
        let mut h = start(VirtualTuner::default());

        assert_eq!(h.command("SEEK").await, "% Freq: 89100");
        assert_eq!(h.command("GET_SIGNAL").await, format!("% Signal: {}", 0xB000));
        assert_eq!(h.command("SEEK DOWN").await, "% Freq: 105100");
        assert_eq!(h.command("ID").await, "% Id: Virtual FM Tuner");
    }

    #[tokio::test]
    async fn test_unknown_and_blank_lines_are_silent() {
        let mut h = start(VirtualTuner::default());

        h.send("TUNE 5\n\r\nfoo bar\n").await;
        assert_eq!(h.command("get_freq").await, "% Freq: 87500");
    }

    #[tokio::test]
    async fn test_split_and_batched_command_lines() {
        let mut h = start(VirtualTuner::default());

        h.send("SET_FR").await;
        h.send("EQ 97400\r\nGET_SIGNAL\n").await;
        assert_eq!(h.line().await.unwrap(), "% Freq: 97400");
        assert_eq!(h.line().await.unwrap(), format!("% Signal: {}", 0x9000));
    }
}

// ============================================================================
// Groups
// ============================================================================

mod groups {
    use super::*;

    #[tokio::test]
    async fn test_clean_group_is_forwarded() {
        let mut h = start(VirtualTuner::default());

        h.feed(&clean_group()).await;
        assert_eq!(h.line().await.unwrap(), "1234 5678 9ABC DEF0 ");
    }

    #[tokio::test]
    async fn test_resync_drops_partial_group() {
        let mut h = start(VirtualTuner::default());

        let mut blocks = vec![
            block(0x1111, BlockPosition::B),
            block(0x2222, BlockPosition::A),
            block(0x3333, BlockPosition::C),
        ];
        blocks.extend(clean_group());
        h.feed(&blocks).await;

        assert_eq!(h.line().await.unwrap(), "1234 5678 9ABC DEF0 ");

        drop(h.client);
        let summary = h.task.await.unwrap().unwrap();
        assert_eq!(summary.reason, EndReason::ClientClosed);
        assert_eq!(summary.decoder.groups, 1);
        assert!(summary.decoder.resyncs >= 2);
    }

    #[tokio::test]
    async fn test_c_prime_and_uncorrectable_blocks() {
        let mut h = start(VirtualTuner::default());

        h.feed(&[
            block(0xF211, BlockPosition::A),
            block(0x0408, BlockPosition::B),
            RawBlock::new(0xBEEF, BlockPosition::CPrime, BlockQuality::Uncorrectable),
            RawBlock::new(0x4652, BlockPosition::D, BlockQuality::Corrected),
        ])
        .await;

        assert_eq!(h.line().await.unwrap(), "F211 0408 ---- ---- ");
    }

    #[tokio::test]
    async fn test_groups_and_replies_share_one_connection() {
        let mut h = start(VirtualTuner::default());

        h.feed(&clean_group()).await;
        assert_eq!(h.line().await.unwrap(), "1234 5678 9ABC DEF0 ");
        assert_eq!(h.command("SET_FREQ 93500").await, "% Freq: 93500");

        // A group split across device reads
        let bytes = blocks_to_bytes(&clean_group());
        h.device.write_all(&bytes[..5]).await.unwrap();
        tokio::task::yield_now().await;
        h.device.write_all(&bytes[5..]).await.unwrap();
        assert_eq!(h.line().await.unwrap(), "1234 5678 9ABC DEF0 ");
    }
}

// ============================================================================
// Termination
// ============================================================================

mod termination {
    use super::*;

    #[tokio::test]
    async fn test_quit_closes_without_reply() {
        let mut h = start(VirtualTuner::default());

        h.send("QUIT\nGET_FREQ\n").await;
        assert_eq!(h.line().await, None);

        let summary = h.task.await.unwrap().unwrap();
        assert_eq!(summary.reason, EndReason::Quit);
        assert_eq!(summary.commands, 1);
    }

    #[tokio::test]
    async fn test_device_eof_ends_session() {
        let h = start(VirtualTuner::default());
        drop(h.device);

        let summary = h.task.await.unwrap().unwrap();
        assert_eq!(summary.reason, EndReason::DeviceClosed);
    }

    #[tokio::test]
    async fn test_tuner_failure_ends_session() {
        let mut h = start(VirtualTuner::default());
        h.tuner.set_failure(Some("device unplugged"));

        h.send("GET_FREQ\n").await;
        assert_eq!(h.line().await, None);

        let result = h.task.await.unwrap();
        assert!(matches!(result, Err(SessionError::Tuner(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_keeps_polling() {
        let config = SessionConfig {
            poll_interval: Duration::from_secs(1),
        };
        let h = start_with(VirtualTuner::default(), config);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        drop(h.client);

        let summary = h.task.await.unwrap().unwrap();
        assert_eq!(summary.reason, EndReason::ClientClosed);
        assert!(summary.idle_polls >= 3);
    }
}

// ============================================================================
// Server
// ============================================================================

mod server {
    use super::*;

    #[tokio::test]
    async fn test_session_over_tcp() {
        let server = start_server().await;
        let mut client = connect(server.addr).await;

        client.write_all(b"SET_FREQ 97400\n").await.unwrap();
        assert_eq!(next_reply(&mut client).await, "% Freq: 97400");

        let group = next_group(&mut client).await;
        assert!(group.starts_with("F205 "), "unexpected group {:?}", group);
        assert_eq!(group.split(' ').count(), 4);

        client.write_all(b"QUIT\n").await.unwrap();
        let mut rest = String::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            while client.read_line(&mut rest).await.unwrap_or(0) > 0 {
                rest.clear();
            }
        })
        .await
        .expect("connection should close after QUIT");

        let _ = server.shutdown.send(());
        server.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_sessions_last_writer_wins() {
        let server = start_server().await;
        let mut first = connect(server.addr).await;
        let mut second = connect(server.addr).await;

        first.write_all(b"SET_FREQ 93500\n").await.unwrap();
        assert_eq!(next_reply(&mut first).await, "% Freq: 93500");

        second.write_all(b"GET_FREQ\n").await.unwrap();
        assert_eq!(next_reply(&mut second).await, "% Freq: 93500");

        second.write_all(b"SET_FREQ 105100\n").await.unwrap();
        assert_eq!(next_reply(&mut second).await, "% Freq: 105100");

        first.write_all(b"GET_FREQ\n").await.unwrap();
        assert_eq!(next_reply(&mut first).await, "% Freq: 105100");
        assert_eq!(server.tuner.frequency_khz(), 105_100);

        let _ = server.shutdown.send(());
        server.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_session_leaves_server_running() {
        let server = start_server().await;

        let mut doomed = connect(server.addr).await;
        server.tuner.set_failure(Some("busy"));
        doomed.write_all(b"GET_FREQ\n").await.unwrap();
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), doomed.read_line(&mut line))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);

        server.tuner.set_failure(None);
        let mut client = connect(server.addr).await;
        client.write_all(b"GET_FREQ\n").await.unwrap();
        assert_eq!(next_reply(&mut client).await, "% Freq: 87500");

        let _ = server.shutdown.send(());
        server.task.await.unwrap().unwrap();
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_on_grid_frequencies_are_tuned(step in 0u32..=205) {
            let khz = 87_500 + step * 100;
            let tuner = VirtualTuner::default();
            let outcome = interpret_line(&tuner, &format!("SET_FREQ {}", khz)).unwrap();
            prop_assert_eq!(outcome, Outcome::Reply(Reply::Frequency(khz)));
            prop_assert_eq!(tuner.frequency_khz(), khz);
        }

        #[test]
        fn test_invalid_frequencies_leave_tuner_alone(khz in 0u32..200_000) {
            prop_assume!(!(87_500..=108_000).contains(&khz) || khz % 100 != 0);
            let tuner = VirtualTuner::default();
            let outcome = interpret_line(&tuner, &format!("SET_FREQ {}", khz)).unwrap();
            prop_assert_eq!(outcome, Outcome::Reply(Reply::InvalidFrequency(khz.to_string())));
            prop_assert_eq!(tuner.frequency_khz(), 87_500);
        }
    }
}
