use std::net::SocketAddr;
use std::time::Duration;

use fleetnav_core::{BotStatus, Database, Location};
use fleetnav_service::channel::ticker;
use fleetnav_service::{build_router, AppState, Config, Delivery, Direction};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> (SocketAddr, AppState) {
    let state = AppState::new(Config::default(), Database::open_in_memory().unwrap());
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect");
    ws
}

async fn say(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(t) = msg {
            return t;
        }
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn register_then_receive_commands() {
    let (addr, state) = serve().await;
    let mut bot = connect(addr).await;

    say(&mut bot, "register Teddy Bear").await;
    assert_eq!(next_text(&mut bot).await, "welcome Teddy Bear");
    assert!(state.channel.is_registered("Teddy Bear"));

    assert_eq!(state.channel.send_command("Teddy Bear", Direction::Left), Delivery::Delivered);
    assert_eq!(next_text(&mut bot).await, "left");

    assert_eq!(ticker::tick_once(&state.channel, Some("Teddy Bear")), 1);
    assert_eq!(next_text(&mut bot).await, "ping");

    say(&mut bot, "what is this").await;
    assert_eq!(next_text(&mut bot).await, "error: unrecognized message");
    // still connected after a bad line
    say(&mut bot, "join 3").await;
    assert_eq!(next_text(&mut bot).await, "welcome");

    bot.close(None).await.unwrap();
    let channel = state.channel.clone();
    wait_until(move || !channel.is_registered("Teddy Bear")).await;
    assert_eq!(state.channel.send_command("Teddy Bear", Direction::Up), Delivery::Dropped);
}

#[tokio::test]
async fn location_reports_drive_navigation() {
    let (addr, state) = serve().await;
    let fleet = state.fleet.clone();
    fleet.create_path(&[Location::new(0.0, 0.0), Location::new(0.0, 0.001)], Some("A"), Some("B")).unwrap();
    let b = fleet.nodes().unwrap().into_iter().find(|n| n.name.as_deref() == Some("B")).unwrap().id;
    let id = fleet.create_bot("Teddy Bear", Location::new(0.0, 0.0)).unwrap().id;
    fleet.assign_destination(id, b).await.unwrap();

    let mut sim = connect(addr).await;
    say(&mut sim, &format!("join {id}")).await;
    assert_eq!(next_text(&mut sim).await, "welcome");
    say(&mut sim, &format!("location {id} 0.0 0.001")).await;
    assert_eq!(next_text(&mut sim).await, "location accepted");

    wait_until(|| fleet.bot(id).map(|bot| bot.status == BotStatus::Idle).unwrap_or(false)).await;
    let stored = fleet.bot(id).unwrap();
    assert_eq!(stored.location, Location::new(0.0, 0.001));
    assert!(stored.path.is_empty());

    // unknown bots are acknowledged too; the failure is only logged
    say(&mut sim, "location 999 0.0 0.0").await;
    assert_eq!(next_text(&mut sim).await, "location accepted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn location_reports_apply_in_arrival_order() {
    let (addr, state) = serve().await;
    let fleet = state.fleet.clone();
    let id = fleet.create_bot("walker", Location::new(0.0, 0.0)).unwrap().id;

    let mut sim = connect(addr).await;
    for k in 1..=50 {
        say(&mut sim, &format!("location {id} 0.0 {}", f64::from(k) * 1e-5)).await;
    }
    for _ in 1..=50 {
        assert_eq!(next_text(&mut sim).await, "location accepted");
    }

    let last = Location::new(0.0, 50.0 * 1e-5);
    wait_until(|| fleet.bot(id).map(|bot| bot.location == last).unwrap_or(false)).await;
    // nothing older lands afterwards
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fleet.bot(id).unwrap().location, last);
}

#[tokio::test]
async fn newest_registration_wins() {
    let (addr, state) = serve().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    say(&mut first, "register bot").await;
    assert_eq!(next_text(&mut first).await, "welcome bot");
    say(&mut second, "register bot").await;
    assert_eq!(next_text(&mut second).await, "welcome bot");

    first.close(None).await.unwrap();
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(state.channel.is_registered("bot"));
    assert_eq!(state.channel.send_command("bot", Direction::Right), Delivery::Delivered);
    assert_eq!(next_text(&mut second).await, "right");
}
