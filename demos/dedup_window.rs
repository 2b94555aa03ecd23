//! Drops duplicate messages seen within a one-second window, and tracks pending
//! requests that are abandoned when their connection goes away.

use std::time::Duration;
use tokio::time::sleep;
use ttlmap::{ExpiringMap, LifetimeScope};

#[tokio::main]
async fn main() -> Result<(), ttlmap::Error> {
    let seen = ExpiringMap::builder(Duration::from_secs(1))
        .name("dedup")
        .eviction_listener(|id: String, _: (), cause| println!("Forgot {id} because {cause:?}"))
        .build()?;
    let process = LifetimeScope::new();

    for id in ["a", "b", "a", "c", "b"] {
        if seen.test_and_put(&process, id.to_string(), ()) {
            println!("Processing message {id}");
        } else {
            println!("Dropping duplicate {id}");
        }
    }

    sleep(Duration::from_millis(1_100)).await;
    // The window has passed, so "a" is accepted again.
    assert!(seen.test_and_put(&process, "a".to_string(), ()));

    // Pending requests live for at most 30 seconds, or until their connection
    // is closed.
    let pending = ExpiringMap::builder(Duration::from_secs(30))
        .name("pending")
        .eviction_listener(|id: u64, path: String, cause| {
            println!("Request {id} ({path}) left the table because {cause:?}")
        })
        .build()?;
    let connection = process.child();
    pending.put(&connection, 1, "GET /index.html".to_string());
    pending.put_with_ttl(&connection, 2, "GET /slow".to_string(), Duration::from_millis(200))?;

    sleep(Duration::from_millis(300)).await;
    println!("{} request(s) pending after the short TTL", pending.len());

    // The client hung up.
    connection.cancel();
    sleep(Duration::from_millis(50)).await;
    println!("{} request(s) pending after disconnect", pending.len());

    Ok(())
}
