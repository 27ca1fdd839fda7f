use std::collections::VecDeque;
use std::mem;

use crate::error::{ConfigError, MpcError};

/// Messages one party sends to one peer in a single round.
pub type RoundFrame = Vec<Vec<u8>>;

/// Point-to-point and broadcast messaging as seen by a native protocol.
/// Parties are 1-indexed; broadcasts include the sending party itself.
pub trait Network {
    fn num_parties(&self) -> usize;

    /// Queue `message` for `party`.
    fn send(&mut self, party: usize, message: Vec<u8>) -> Result<(), MpcError>;

    /// Next message from `party`, in the order it was sent.
    fn receive(&mut self, party: usize) -> Result<Vec<u8>, MpcError>;

    /// Send `message` to every party, including this one.
    fn send_to_all(&mut self, message: Vec<u8>) -> Result<(), MpcError> {
        for party in 1..=self.num_parties() {
            self.send(party, message.clone())?;
        }
        Ok(())
    }

    /// Next message from every party, ordered by party id.
    fn receive_from_all(&mut self) -> Result<Vec<Vec<u8>>, MpcError> {
        (1..=self.num_parties())
            .map(|party| self.receive(party))
            .collect()
    }
}

/// Network that buffers a whole round of sends and delivers what the previous flush received.
pub struct RoundNetwork {
    party_id: usize,
    outbox: Vec<RoundFrame>,
    inbox: Vec<VecDeque<Vec<u8>>>,
    bytes_sent: usize,
}

impl RoundNetwork {
    pub fn new(party_id: usize, num_parties: usize) -> Self {
        Self {
            party_id,
            outbox: vec![Vec::new(); num_parties],
            inbox: vec![VecDeque::new(); num_parties],
            bytes_sent: 0,
        }
    }

    /// Take the queued frames, one per party. The frame for this party is looped back
    /// into the inbox right away.
    pub fn take_outgoing(&mut self) -> Result<Vec<RoundFrame>, MpcError> {
        self.ensure_drained()?;
        let mut frames: Vec<_> = self.outbox.iter_mut().map(mem::take).collect();
        let own = mem::take(&mut frames[self.party_id - 1]);
        self.inbox[self.party_id - 1].extend(own);
        self.bytes_sent += frames.iter().flatten().map(Vec::len).sum::<usize>();
        Ok(frames)
    }

    /// Store frames received from peers for the next round.
    pub fn deliver(&mut self, frames: Vec<(usize, RoundFrame)>) -> Result<(), MpcError> {
        for (party, frame) in frames {
            let queue = self.queue(party)?;
            queue.extend(frame);
        }
        Ok(())
    }

    /// Fail if a message was delivered but never received by any protocol.
    pub fn ensure_drained(&self) -> Result<(), MpcError> {
        match self.inbox.iter().position(|queue| !queue.is_empty()) {
            Some(index) => Err(MpcError::Protocol(format!(
                "{} unconsumed message(s) from party {}",
                self.inbox[index].len(),
                index + 1
            ))),
            None => Ok(()),
        }
    }

    pub fn has_outgoing(&self) -> bool {
        self.outbox.iter().any(|frame| !frame.is_empty())
    }

    /// Total payload bytes handed to peers so far.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    fn queue(&mut self, party: usize) -> Result<&mut VecDeque<Vec<u8>>, ConfigError> {
        let num_parties = self.inbox.len();
        party
            .checked_sub(1)
            .and_then(|index| self.inbox.get_mut(index))
            .ok_or(ConfigError::PartyIdOutOfRange {
                party_id: party,
                num_parties,
            })
    }
}

impl Network for RoundNetwork {
    fn num_parties(&self) -> usize {
        self.outbox.len()
    }

    fn send(&mut self, party: usize, message: Vec<u8>) -> Result<(), MpcError> {
        let num_parties = self.outbox.len();
        let frame = party
            .checked_sub(1)
            .and_then(|index| self.outbox.get_mut(index))
            .ok_or(ConfigError::PartyIdOutOfRange {
                party_id: party,
                num_parties,
            })?;
        frame.push(message);
        Ok(())
    }

    fn receive(&mut self, party: usize) -> Result<Vec<u8>, MpcError> {
        self.queue(party)?.pop_front().ok_or_else(|| {
            MpcError::Protocol(format!("no message from party {party} in this round"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_and_delivery() {
        let mut net = RoundNetwork::new(2, 3);
        net.send_to_all(vec![7]).unwrap();
        net.send(3, vec![8]).unwrap();
        assert!(net.has_outgoing());

        let frames = net.take_outgoing().unwrap();
        assert_eq!(frames, vec![vec![vec![7]], vec![], vec![vec![7], vec![8]]]);
        assert!(!net.has_outgoing());
        assert_eq!(net.bytes_sent(), 3);

        net.deliver(vec![(1, vec![vec![1]]), (3, vec![vec![3]])])
            .unwrap();
        assert_eq!(net.receive_from_all().unwrap(), vec![vec![1], vec![7], vec![3]]);
        assert!(net.ensure_drained().is_ok());
    }

    #[test]
    fn test_fifo_per_party() {
        let mut net = RoundNetwork::new(1, 2);
        net.deliver(vec![(2, vec![vec![1], vec![2]])]).unwrap();
        assert_eq!(net.receive(2).unwrap(), vec![1]);
        assert_eq!(net.receive(2).unwrap(), vec![2]);
        assert!(matches!(net.receive(2), Err(MpcError::Protocol(_))));
    }

    #[test]
    fn test_unconsumed_message_blocks_flush() {
        let mut net = RoundNetwork::new(1, 2);
        net.deliver(vec![(2, vec![vec![1]])]).unwrap();
        assert!(net.take_outgoing().is_err());
    }

    #[test]
    fn test_unknown_party() {
        let mut net = RoundNetwork::new(1, 2);
        assert!(matches!(
            net.send(3, vec![]),
            Err(MpcError::Config(ConfigError::PartyIdOutOfRange { .. }))
        ));
        assert!(net.receive(0).is_err());
        assert!(net.deliver(vec![(5, vec![])]).is_err());
    }
}
