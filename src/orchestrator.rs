//! Picks the role for this process and runs it.

use crate::client;
use crate::config::{Config, Mode};
use crate::error::Error;
use crate::server;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

/// Run the configured role to completion.
pub async fn run(config: &Config) -> Result<(), Error> {
    match config.mode {
        Mode::Server => server::serve(config.listen, config.wait, config.keepalive).await,
        Mode::Client => {
            spawn_clients(&config.connect, config.num_clients, config.stagger).await;
            Ok(())
        }
    }
}

/// Start `num_clients` sessions against `addr`, sleeping `stagger` after
/// each spawn, then wait for every session to end.
///
/// Returns the number of sessions that ran.
pub async fn spawn_clients(addr: &str, num_clients: usize, stagger: Duration) -> usize {
    let addr = addr.to_string();
    spawn_staggered(num_clients, stagger, move |_| {
        let addr = addr.clone();
        async move {
            client::run(&addr).await;
        }
    })
    .await
}

/// Spawn `count` sessions built by `session`, one per `stagger`, and wait
/// for all of them.
async fn spawn_staggered<F, Fut>(count: usize, stagger: Duration, mut session: F) -> usize
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut sessions = JoinSet::new();

    for i in 1..=count {
        info!("Spawning client {i}/{count}");
        sessions.spawn(session(i).instrument(tracing::info_span!("client", id = i)));

        info!(stagger_secs = stagger.as_secs(), "Sleeping before spawning next client");
        tokio::time::sleep(stagger).await;
    }

    let mut finished = 0;
    while let Some(result) = sessions.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Client task failed");
        }
        finished += 1;
    }

    info!(finished, "All clients finished");
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keepalive::KeepaliveParameters;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_spawns_and_waits_for_all_clients() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));

        // Accept and immediately close, ending each client session.
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let stagger = Duration::from_millis(50);
        let start = std::time::Instant::now();
        let finished = spawn_clients(&addr, 3, stagger).await;

        assert_eq!(finished, 3);
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= stagger * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stagger_between_spawns() {
        let stagger = Duration::from_secs(60);
        let started = Arc::new(std::sync::Mutex::new(Vec::new()));

        let log = Arc::clone(&started);
        let finished = spawn_staggered(4, stagger, move |i| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push((i, tokio::time::Instant::now()));
            }
        })
        .await;

        assert_eq!(finished, 4);
        let started = started.lock().unwrap();
        assert_eq!(started.len(), 4);
        for pair in started.windows(2) {
            let ((prev_id, prev_at), (next_id, next_at)) = (pair[0], pair[1]);
            assert_eq!(next_id, prev_id + 1);
            assert!(next_at - prev_at >= stagger);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_slow_sessions() {
        let start = tokio::time::Instant::now();

        // Sessions outlive the whole spawn loop.
        let finished = spawn_staggered(2, Duration::from_secs(1), |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
        .await;

        assert_eq!(finished, 2);
        assert!(start.elapsed() >= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_zero_clients() {
        assert_eq!(spawn_clients("127.0.0.1:1", 0, Duration::from_secs(60)).await, 0);
    }

    #[tokio::test]
    async fn test_client_mode_end_to_end() {
        let server = server::Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            Duration::ZERO,
            KeepaliveParameters::default(),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        drop(server);

        let config = Config {
            mode: Mode::Client,
            listen: addr.port(),
            connect: addr.to_string(),
            num_clients: 2,
            wait: Duration::ZERO,
            stagger: Duration::from_millis(10),
            keepalive: KeepaliveParameters::default(),
            log_level: "info".to_string(),
        };

        // Nothing listens any more, so both sessions fail to connect and
        // run() returns once they have.
        tokio::time::timeout(Duration::from_secs(5), run(&config))
            .await
            .unwrap()
            .unwrap();
    }
}
