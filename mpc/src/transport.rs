mod config;
mod networking;

pub use config::{NetworkConfig, NetworkPartyConfig};
pub use networking::{connect_multiparty, NetChannel};

use std::io;

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    FutureExt, Sink, SinkExt, Stream, StreamExt, TryFutureExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;

use crate::network::RoundFrame;

/// Error type for channels. Party ids are 1-indexed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("error while sending message to party {0}")]
    Send(usize),
    #[error("error while receiving message from party {0}")]
    Recv(usize),
    #[error("no channel to party {0}")]
    MissingChannel(usize),
    #[error("connection setup failed: {0}")]
    Connect(#[from] io::Error),
}

/// Wrapper for peer-to-peer connections in multi-party protocol.
pub struct MultipartyTransport<T, Channel> {
    channels: Vec<Option<(SplitSink<Channel, T>, SplitStream<Channel>)>>,
    party_id: usize,
}

impl<T, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Create wrapper for given list of connections, the first one leading to party 1.
    /// Every channel except the one at position `party_id` must be present.
    pub fn new(
        channels: impl IntoIterator<Item = Option<Channel>>,
        party_id: usize,
    ) -> Result<Self, TransportError> {
        // Split into unidirectional halves, so sends and receives can be awaited together.
        let channels: Vec<_> = channels.into_iter().map(|x| x.map(|x| x.split())).collect();
        for (index, channel) in channels.iter().enumerate() {
            if index + 1 != party_id && channel.is_none() {
                return Err(TransportError::MissingChannel(index + 1));
            }
        }
        Ok(Self { channels, party_id })
    }
}

impl<T, Channel> MultipartyTransport<T, Channel> {
    /// Number of parties participating in multi-party protocol.
    pub fn num_parties(&self) -> usize {
        self.channels.len()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    fn peer(
        &mut self,
        party: usize,
    ) -> Result<&mut (SplitSink<Channel, T>, SplitStream<Channel>), TransportError> {
        party
            .checked_sub(1)
            .and_then(|index| self.channels.get_mut(index))
            .and_then(Option::as_mut)
            .ok_or(TransportError::MissingChannel(party))
    }
}

impl<T, E, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send message to party with given ID.
    pub async fn send_to(&mut self, party: usize, msg: T) -> Result<(), TransportError> {
        let (sink, _) = self.peer(party)?;
        sink.send(msg).await.map_err(|_| TransportError::Send(party))
    }

    /// Receive message from party with given ID.
    pub async fn receive_from(&mut self, party: usize) -> Result<T, TransportError> {
        let (_, stream) = self.peer(party)?;
        match stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(TransportError::Recv(party)),
        }
    }

    /// Concurrently send one message to every peer and receive one message from each.
    /// `messages` holds an entry per party; the entry of this party is ignored.
    pub async fn exchange(&mut self, messages: Vec<T>) -> Result<Vec<(usize, T)>, TransportError> {
        let party_id = self.party_id;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .zip(messages)
                .enumerate()
                .map(|(index, pair)| (index + 1, pair))
                .filter(|(party, _)| *party != party_id)
                .filter_map(|(party, (channel, msg))| {
                    let (sink, stream) = channel.as_mut()?;
                    let send_future = sink
                        .send(msg)
                        .map_err(move |_| TransportError::Send(party));
                    let recv_future = stream.next().map(move |raw| match raw {
                        Some(Ok(msg)) => Ok((party, msg)),
                        _ => Err(TransportError::Recv(party)),
                    });
                    let exchange_future = futures::future::try_join(send_future, recv_future);
                    Some(exchange_future.map_ok(|(_, msg)| msg))
                }),
        )
        .await
    }
}

/// Transport as seen by the protocol evaluator: one exchange of frames per round.
#[async_trait]
pub trait RoundTransport: Send {
    fn party_id(&self) -> usize;

    fn num_parties(&self) -> usize;

    /// Send `frames[i]` to party `i + 1` and receive one frame from every peer.
    async fn exchange(
        &mut self,
        frames: Vec<RoundFrame>,
    ) -> Result<Vec<(usize, RoundFrame)>, TransportError>;
}

#[async_trait]
impl<E, Channel> RoundTransport for MultipartyTransport<RoundFrame, Channel>
where
    Channel: Stream<Item = Result<RoundFrame, E>> + Sink<RoundFrame> + Unpin + Send,
{
    fn party_id(&self) -> usize {
        self.party_id
    }

    fn num_parties(&self) -> usize {
        self.channels.len()
    }

    async fn exchange(
        &mut self,
        frames: Vec<RoundFrame>,
    ) -> Result<Vec<(usize, RoundFrame)>, TransportError> {
        MultipartyTransport::exchange(self, frames).await
    }
}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<T, C> =
    tokio_serde::Framed<tokio_util::codec::Framed<C, LengthDelimitedCodec>, T, T, Bincode<T, T>>;

/// Length-framed Bincode-encoded tokio's Duplex stream.
pub type BincodeDuplex<T> = BincodeStreamSink<T, DuplexStream>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_bincode<T, C>(channel: C) -> BincodeStreamSink<T, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create bidirectional Bincode-encoded channel.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (wrap_bincode(a), wrap_bincode(b))
}

/// Create in-process channels for testing multiparty protocols.
/// The transport at position `i` belongs to party `i + 1`.
pub fn mock_multiparty_channels<T>(
    num_parties: usize,
    max_buf_size: usize,
) -> Vec<MultipartyTransport<T, BincodeDuplex<T>>>
where
    T: Serialize + DeserializeOwned + Unpin,
{
    let mut matrix: Vec<Vec<_>> = (0..num_parties)
        .map(|_| (0..num_parties).map(|_| None).collect())
        .collect();

    for i in 0..num_parties {
        for j in 0..i {
            let (a, b) = bincode_duplex::<T>(max_buf_size);
            matrix[i][j] = Some(a);
            matrix[j][i] = Some(b);
        }
    }

    matrix
        .into_iter()
        .enumerate()
        .map(|(index, row)| MultipartyTransport {
            channels: row.into_iter().map(|x| x.map(|x| x.split())).collect(),
            party_id: index + 1,
        })
        .collect()
}
