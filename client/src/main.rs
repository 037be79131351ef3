use clap::Parser;
use client::LobbyClient;
use log::info;
use shared::SessionInfo;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:17001")]
    server: String,

    /// Display name to log in with
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Name of the room to create
    #[arg(short = 'r', long, default_value = "lobby")]
    room: String,
}

/// Walks the whole lobby protocol once against a running server: login,
/// create a room, list rooms, join, list members, create and list a game,
/// leave, close.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = LobbyClient::connect(&args.server).await?;
    let ip = client.local_ip_bytes()?;

    let user_id = client.login(&args.name, SessionInfo::default()).await?;
    println!("Logged in as {} with session id {:#x}", args.name, user_id);

    let room_id = client
        .create_room(&args.room, ip.clone(), SessionInfo::default())
        .await?;
    println!("Created room {} with id {:#x}", args.room, room_id);

    let (rooms, _) = client.list_rooms().await?;
    println!("Rooms:");
    for room in &rooms {
        println!("  {:#x}  {}", room.value1, room.name_str());
    }

    let error = client.join_room(room_id, user_id).await?;
    println!("Joined room {:#x} (error {})", room_id, error);

    let (users, _) = client.list_users(room_id).await?;
    println!("Members of room {:#x}:", room_id);
    for user in &users {
        println!("  {:#x}  {}", user.value1, user.name_str());
    }

    let game_id = client
        .create_game("match", ip, room_id, SessionInfo::default())
        .await?;
    println!("Created game with id {:#x}", game_id);

    let (games, _) = client.list_games(room_id).await?;
    println!("Games hosted by room {:#x}:", room_id);
    for game in &games {
        println!("  {:#x}  {}", game.value1, game.name_str());
    }

    client.leave_room(room_id, user_id).await?;
    client.close(room_id).await?;
    println!("Left and closed room {:#x}", room_id);

    Ok(())
}
