//! Headless scripted client for exercising a running server.
//!
//! Connects, votes ready, then streams forward-walk inputs with a push every
//! few seconds while printing the snapshots it gets back.

use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{timestamp_ms, Input, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Scripted headless client")]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: String,
    /// How long to run, in seconds
    #[clap(short, long, default_value = "30")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Bot socket bound to {}", socket.local_addr()?);

    let server_addr = args.server.parse::<SocketAddr>()?;
    let connect = serialize(&Packet::Connect { client_version: 1 })?;
    println!("Connecting to {}", server_addr);
    socket.send_to(&connect, server_addr).await?;

    let mut buf = [0u8; 4096];
    let (len, _) = socket.recv_from(&mut buf).await?;
    let my_id = match deserialize::<Packet>(&buf[0..len])? {
        Packet::Connected { id } => {
            println!("Connected with id {}", id);
            id
        }
        Packet::Rejected { reason } => {
            println!("Rejected: {}", reason);
            return Ok(());
        }
        other => {
            println!("Unexpected response: {:?}", other);
            return Ok(());
        }
    };

    let ready = serialize(&Packet::ReadyUp(true))?;
    socket.send_to(&ready, server_addr).await?;
    println!("Voted ready");

    let mut input_interval = interval(Duration::from_millis(16));
    let started = tokio::time::Instant::now();
    let mut snapshots: u64 = 0;

    while started.elapsed() < Duration::from_secs(args.duration) {
        tokio::select! {
            _ = input_interval.tick() => {
                let mut input = Input::new(timestamp_ms());
                input.forwardmove = -1;
                // Shove whatever is ahead every four seconds.
                input.attack = started.elapsed().as_secs() % 4 == 0;
                let data = serialize(&Packet::Input(input))?;
                socket.send_to(&data, server_addr).await?;
            }
            result = socket.recv_from(&mut buf) => {
                let (len, _) = result?;
                match deserialize::<Packet>(&buf[0..len]) {
                    Ok(Packet::Snapshot(snap)) => {
                        snapshots += 1;
                        if snapshots % 60 == 0 {
                            if let Some(me) = snap.players.get(&my_id) {
                                println!(
                                    "t={} pos=({:.2}, {:.2}, {:.2}) dead={}",
                                    snap.time,
                                    me.position.x, me.position.y, me.position.z,
                                    me.dead
                                );
                            }
                        }
                    }
                    Ok(Packet::Generation { respawns }) => {
                        println!(
                            "Generation: {} red / {} blue respawn points",
                            respawns.red.len(),
                            respawns.blue.len()
                        );
                    }
                    Ok(Packet::GameStart { time }) => println!("Match started at {}", time),
                    Ok(Packet::GameEnd { result }) => {
                        println!("Match over: {:?}", result);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => println!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    let disconnect = serialize(&Packet::Disconnect)?;
    socket.send_to(&disconnect, server_addr).await?;
    println!("Bot finished after {} snapshots", snapshots);

    Ok(())
}
