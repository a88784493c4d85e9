extern crate lwwset;

use std::sync::Arc;
use std::thread;

use lwwset::LWWSet;

fn main() {
    // one set shared by every thread, no outer lock anywhere
    let online = Arc::new(LWWSet::new());

    // a fleet of workers reports user sessions: odd ticks log the
    // user off, even ticks log them back on, and everyone pings the
    // lobby every tick
    let mut handles = Vec::new();
    for worker in 0..4i64 {
        let online = Arc::clone(&online);
        handles.push(thread::spawn(move || {
            let user = format!("user-{}", worker);
            for tick in 1..=1000i64 {
                let stamp = tick * 4 + worker;
                if tick % 2 == 0 {
                    online.add(user.clone(), stamp).unwrap();
                } else {
                    online.remove(user.clone(), stamp).unwrap();
                }
                online.add("lobby".to_string(), stamp).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // every worker's final word was an even tick, so everyone is online
    let mut users = online.values();
    users.sort();
    assert_eq!(users.len(), 5);
    println!("online now: {:?}", users);

    // 4000 racing writes against one member collapsed to the single
    // largest stamp: tick 1000 from the last worker
    let lobby = online
        .add_entries()
        .into_iter()
        .find(|(member, _)| member == "lobby");
    assert_eq!(lobby, Some(("lobby".to_string(), 4003)));
}
