//! Concurrent access tests for the client registry

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chatrelay::registry::{ClientHandle, ClientRegistry, RegistryError};
use tokio::io::sink;

fn client() -> Arc<ClientHandle> {
    let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
    Arc::new(ClientHandle::new(addr, sink()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_remove_keeps_snapshots_consistent() {
    let registry = Arc::new(ClientRegistry::new(64));
    let done = Arc::new(AtomicBool::new(false));

    let checker = {
        let registry = Arc::clone(&registry);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut snapshots = 0;
            while !done.load(Ordering::Relaxed) {
                let snapshot = registry.snapshot_for_broadcast().await;
                let mut seen = HashSet::new();
                for client in snapshot.iter() {
                    assert!(seen.insert(client.id()), "duplicate client in snapshot");
                    assert!(!client.is_closed(), "closed client still registered");
                }
                drop(snapshot);
                snapshots += 1;
                tokio::task::yield_now().await;
            }
            snapshots
        })
    };

    let mut workers = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        workers.push(tokio::spawn(async move {
            for _ in 0..100 {
                let handle = client();
                registry.add(Arc::clone(&handle)).await.unwrap();
                tokio::task::yield_now().await;
                let removed = registry.remove(handle.id()).await;
                assert!(removed.is_some());
                handle.close().await.unwrap();
            }
        }));
    }

    for worker in workers {
        worker.await.unwrap();
    }
    done.store(true, Ordering::Relaxed);

    assert!(checker.await.unwrap() > 0);
    assert!(registry.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_respect_capacity() {
    let registry = Arc::new(ClientRegistry::new(8));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.add(client()).await }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(RegistryError::CapacityExceeded { capacity }) => {
                assert_eq!(capacity, 8);
                rejected += 1;
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(accepted, 8);
    assert_eq!(rejected, 24);
    assert_eq!(registry.len().await, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_removals_of_same_client() {
    let registry = Arc::new(ClientRegistry::new(8));
    let handle = client();
    registry.add(Arc::clone(&handle)).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let id = handle.id();
        tasks.push(tokio::spawn(async move { registry.remove(id).await.is_some() }));
    }

    let mut removed = 0;
    for task in tasks {
        if task.await.unwrap() {
            removed += 1;
        }
    }
    assert_eq!(removed, 1);
    assert!(registry.is_empty().await);
}
