use std::{io, net::SocketAddr, time::Duration};

use futures::{future, stream::FuturesUnordered, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, instrument};

use super::{wrap_bincode, BincodeStreamSink, MultipartyTransport, NetworkConfig, TransportError};

/// Delay in milliseconds after which connection to peer is retried.
const CONNECTION_RETRY_DELAY: u64 = 1000;

/// Handshake value exchanged before a connection is used.
const MAGIC: u32 = 0xDEADBEEF;

/// Bincode-encoded network channel.
pub type NetChannel<T> = BincodeStreamSink<T, TcpStream>;

/// Establish network connections for multiparty protocol.
/// Every party listens for parties with lower IDs and connects to parties with higher IDs.
#[instrument(skip(config))]
pub async fn connect_multiparty<T>(
    config: &NetworkConfig,
    party_id: usize,
) -> Result<MultipartyTransport<T, NetChannel<T>>, TransportError>
where
    T: Serialize + DeserializeOwned,
{
    let parties = &config.parties;
    if party_id == 0 || party_id > parties.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Invalid party ID").into());
    }
    let this_party = &parties[party_id - 1];
    let listen_for = listen_for_parties(this_party.address, party_id - 1);

    let connect_to = future::try_join_all(
        parties[party_id..]
            .iter()
            .map(|other| connect_to_party(other.address, party_id)),
    );

    let (listen_for, connect_to) = futures::try_join!(listen_for, connect_to)?;
    debug!(num_parties = parties.len(), "Connected to all parties");

    let channels = listen_for
        .into_iter()
        .map(Some)
        .chain(std::iter::once(None))
        .chain(connect_to.into_iter().map(Some))
        .map(|x| x.map(wrap_bincode));

    MultipartyTransport::new(channels, party_id)
}

/// Listen for incoming connections from parties `1..=num_lower`.
async fn listen_for_parties(addr: SocketAddr, num_lower: usize) -> io::Result<Vec<TcpStream>> {
    if num_lower == 0 {
        return Ok(Vec::new());
    }

    let listener = TcpListener::bind(addr).await?;
    let mut futures = FuturesUnordered::new();
    let mut connected_parties: Vec<Option<TcpStream>> = (0..num_lower).map(|_| None).collect();

    loop {
        tokio::select! {
            tmp = listener.accept() => {
                let (socket, _) = tmp?;
                futures.push(accept_party(num_lower, socket));
            },
            tmp = futures.next(), if !futures.is_empty() => {
                if let Some(Ok((socket, id))) = tmp {
                    if connected_parties[id - 1].is_none() {
                        debug!(party = id, "Accepted connection");
                        connected_parties[id - 1] = Some(socket);
                        if connected_parties.iter().all(Option::is_some) {
                            break;
                        }
                    }
                }
            },
        }
    }

    Ok(connected_parties.into_iter().flatten().collect())
}

/// Process incoming connection from party.
async fn accept_party(num_lower: usize, mut socket: TcpStream) -> io::Result<(TcpStream, usize)> {
    if socket.read_u32().await? != MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }

    let party_id = socket.read_u32().await? as usize;
    if party_id == 0 || party_id > num_lower {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid party ID"));
    }

    socket.write_u32(MAGIC).await?;
    socket.flush().await?;

    Ok((socket, party_id))
}

/// Connect to party with higher ID.
async fn connect_to_party(addr: SocketAddr, this_party_id: usize) -> io::Result<TcpStream> {
    let mut socket = loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => break socket,
            _ => tokio::time::sleep(Duration::from_millis(CONNECTION_RETRY_DELAY)).await,
        }
    };

    socket.write_u32(MAGIC).await?;
    socket.write_u32(this_party_id as u32).await?;
    socket.flush().await?;

    if socket.read_u32().await? != MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }
    debug!(%addr, "Connected");

    Ok(socket)
}
