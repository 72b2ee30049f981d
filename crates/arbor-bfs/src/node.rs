//! BFS labeling and echo bookkeeping

use std::collections::HashMap;

use tracing::warn;

use arbor_core::{Command, Message, Payload, PeerId};

/// Sink for envelopes emitted by the state machine.
///
/// Implementations enqueue and return; handlers never block on delivery.
pub trait Outbox {
    /// Queue an envelope for delivery.
    fn send(&self, message: Message);
}

/// Echo kinds, exactly one of which answers every outstanding `Label`.
enum Echo {
    Keepon,
    Stop,
    End,
}

/// Per-peer spanning-tree state.
///
/// Built exactly once, after the listener is sealed, from the then-frozen
/// neighbor set. The caller serializes handler invocations behind a guard;
/// every handler runs to completion without suspension.
///
/// Membership sets keep insertion order: `neighbors` is frozen at
/// construction, `send_to` is the open frontier, `children` the neighbors
/// that reported adopting this peer as parent.
pub struct BfsNode<O> {
    outbox: O,
    id: PeerId,
    parent: Option<PeerId>,
    tree_level: Option<u64>,
    labeled: bool,
    neighbors: Vec<PeerId>,
    send_to: Vec<PeerId>,
    children: Vec<PeerId>,
    echoed_from: HashMap<PeerId, bool>,
}

impl<O: Outbox> BfsNode<O> {
    /// Build a node over a frozen neighbor set.
    ///
    /// Duplicate IDs in `neighbors` collapse to one entry.
    pub fn new(outbox: O, id: PeerId, neighbors: Vec<PeerId>) -> Self {
        let mut unique = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            if !unique.contains(&neighbor) {
                unique.push(neighbor);
            }
        }

        Self {
            outbox,
            id,
            parent: None,
            tree_level: None,
            labeled: false,
            neighbors: unique,
            send_to: Vec::new(),
            children: Vec::new(),
            echoed_from: HashMap::new(),
        }
    }

    /// Own identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Whether this peer was labeled as the root.
    pub fn is_root(&self) -> bool {
        self.parent.as_ref() == Some(&self.id)
    }

    /// Whether this peer has been labeled yet.
    pub fn labeled(&self) -> bool {
        self.labeled
    }

    /// The adopted parent, unset until labeled.
    pub fn parent(&self) -> Option<&PeerId> {
        self.parent.as_ref()
    }

    /// BFS depth, unset until labeled.
    pub fn tree_level(&self) -> Option<u64> {
        self.tree_level
    }

    /// The frozen neighbor set.
    pub fn neighbors(&self) -> &[PeerId] {
        &self.neighbors
    }

    /// The open frontier.
    pub fn frontier(&self) -> &[PeerId] {
        &self.send_to
    }

    /// Neighbors that reported adopting this peer as parent.
    pub fn children(&self) -> Vec<PeerId> {
        self.children.clone()
    }

    /// Apply one inbound envelope.
    pub fn handle(&mut self, message: &Message) {
        match message.command {
            Command::Init => self.on_init(),
            Command::Label => match message.payload {
                Payload::Level(level) => self.on_label(&message.sender, level),
                ref other => {
                    warn!(sender = %message.sender, payload = ?other, "Label without a level, ignoring");
                }
            },
            Command::Keepon => self.on_echo(&message.sender, Echo::Keepon),
            Command::Stop => self.on_echo(&message.sender, Echo::Stop),
            Command::End => self.on_echo(&message.sender, Echo::End),
            other => {
                warn!(command = ?other, "Command not for the labeling machine, ignoring");
            }
        }
    }

    /// Become the root: level 0, own parent, whole neighbor set as frontier.
    fn on_init(&mut self) {
        self.labeled = true;
        self.parent = Some(self.id.clone());
        self.tree_level = Some(0);
        self.send_to = self.neighbors.clone();
        self.children.clear();

        if self.send_to.is_empty() {
            self.emit(PeerId::coordinator(), Command::Complete, Payload::None);
        } else {
            self.broadcast_label();
        }
    }

    fn on_label(&mut self, sender: &PeerId, level: u64) {
        if !self.labeled {
            self.labeled = true;
            self.parent = Some(sender.clone());
            self.tree_level = Some(level + 1);
            self.send_to = self
                .neighbors
                .iter()
                .filter(|neighbor| *neighbor != sender)
                .cloned()
                .collect();
            self.children.clear();

            if self.send_to.is_empty() {
                self.emit(sender.clone(), Command::End, Payload::None);
            } else {
                // Hold the downward wave; the parent's next Label is the
                // round tick.
                self.emit(sender.clone(), Command::Keepon, Payload::None);
            }
        } else if self.parent.as_ref() == Some(sender) {
            // New round from the parent: probe the remaining frontier.
            self.broadcast_label();
        } else {
            // Non-tree edge from this side; the sender must drop us.
            self.emit(sender.clone(), Command::Stop, Payload::None);
        }
    }

    fn on_echo(&mut self, sender: &PeerId, echo: Echo) {
        self.echoed_from.insert(sender.clone(), true);

        match echo {
            Echo::Keepon => self.add_child(sender),
            Echo::Stop => self.remove_from_frontier(sender),
            Echo::End => {
                self.add_child(sender);
                self.remove_from_frontier(sender);
            }
        }

        if self.send_to.is_empty() {
            // The entire subtree below this peer is done.
            if self.is_root() {
                self.emit(PeerId::coordinator(), Command::Complete, Payload::None);
            } else if let Some(parent) = self.parent.clone() {
                self.emit(parent, Command::End, Payload::None);
            }
        } else if self.frontier_fully_echoed() {
            if self.is_root() {
                self.broadcast_label();
            } else if let Some(parent) = self.parent.clone() {
                // Subtree still growing; keep our slot in the parent's
                // frontier and wait for its next Label.
                self.emit(parent, Command::Keepon, Payload::None);
            }
        }
    }

    /// Send `Label(tree_level)` to every frontier member and reset its echo
    /// flag.
    fn broadcast_label(&mut self) {
        let Some(level) = self.tree_level else {
            return;
        };

        let frontier = self.send_to.clone();
        for neighbor in frontier {
            self.echoed_from.insert(neighbor.clone(), false);
            self.emit(neighbor, Command::Label, Payload::Level(level));
        }
    }

    fn frontier_fully_echoed(&self) -> bool {
        self.send_to
            .iter()
            .all(|neighbor| self.echoed_from.get(neighbor).copied().unwrap_or(false))
    }

    fn add_child(&mut self, id: &PeerId) {
        if !self.children.contains(id) {
            self.children.push(id.clone());
        }
    }

    fn remove_from_frontier(&mut self, id: &PeerId) {
        self.send_to.retain(|neighbor| neighbor != id);
    }

    fn emit(&self, receiver: PeerId, command: Command, payload: Payload) {
        self.outbox
            .send(Message::new(self.id.clone(), receiver, command, payload));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Message>>>);

    impl Outbox for Recorder {
        fn send(&self, message: Message) {
            self.0.borrow_mut().push(message);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<Message> {
            self.0.borrow_mut().drain(..).collect()
        }
    }

    fn node(id: &str, neighbors: &[&str]) -> (BfsNode<Recorder>, Recorder) {
        let recorder = Recorder::default();
        let node = BfsNode::new(
            recorder.clone(),
            PeerId::new(id),
            neighbors.iter().map(|n| PeerId::new(*n)).collect(),
        );
        (node, recorder)
    }

    fn init() -> Message {
        Message::plain(PeerId::coordinator(), PeerId::new("root"), Command::Init)
    }

    fn label(from: &str, to: &str, level: u64) -> Message {
        Message::new(
            PeerId::new(from),
            PeerId::new(to),
            Command::Label,
            Payload::Level(level),
        )
    }

    fn echo(from: &str, to: &str, command: Command) -> Message {
        Message::plain(PeerId::new(from), PeerId::new(to), command)
    }

    #[test]
    fn test_isolated_root_completes_immediately() {
        let (mut root, recorder) = node("root", &[]);
        root.handle(&init());

        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Complete);
        assert!(sent[0].receiver.is_coordinator());
        assert!(root.is_root());
        assert_eq!(root.tree_level(), Some(0));
    }

    #[test]
    fn test_init_labels_whole_frontier() {
        let (mut root, recorder) = node("root", &["a", "b"]);
        root.handle(&init());

        let sent = recorder.take();
        assert_eq!(sent.len(), 2);
        for (message, receiver) in sent.iter().zip(["a", "b"]) {
            assert_eq!(message.command, Command::Label);
            assert_eq!(message.payload, Payload::Level(0));
            assert_eq!(message.receiver, PeerId::new(receiver));
        }
        assert_eq!(root.frontier(), [PeerId::new("a"), PeerId::new("b")]);
    }

    #[test]
    fn test_leaf_replies_end_on_first_label() {
        let (mut leaf, recorder) = node("leaf", &["p"]);
        leaf.handle(&label("p", "leaf", 4));

        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::End);
        assert_eq!(sent[0].receiver, PeerId::new("p"));
        assert_eq!(leaf.parent(), Some(&PeerId::new("p")));
        assert_eq!(leaf.tree_level(), Some(5));
        assert!(leaf.frontier().is_empty());
    }

    #[test]
    fn test_interior_replies_keepon_and_holds_the_wave() {
        let (mut interior, recorder) = node("mid", &["p", "x", "y"]);
        interior.handle(&label("p", "mid", 0));

        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Keepon);
        assert_eq!(sent[0].receiver, PeerId::new("p"));
        // The frontier excludes the parent and waits for the next round.
        assert_eq!(interior.frontier(), [PeerId::new("x"), PeerId::new("y")]);
    }

    #[test]
    fn test_parent_label_ticks_a_new_round() {
        let (mut interior, recorder) = node("mid", &["p", "x"]);
        interior.handle(&label("p", "mid", 0));
        recorder.take();

        interior.handle(&label("p", "mid", 0));
        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Label);
        assert_eq!(sent[0].receiver, PeerId::new("x"));
        assert_eq!(sent[0].payload, Payload::Level(1));
    }

    #[test]
    fn test_label_from_non_parent_is_stopped() {
        let (mut interior, recorder) = node("mid", &["p", "x"]);
        interior.handle(&label("p", "mid", 0));
        recorder.take();

        interior.handle(&label("x", "mid", 2));
        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Stop);
        assert_eq!(sent[0].receiver, PeerId::new("x"));
        // The non-tree sender does not leave our frontier; only its echo
        // to our own Label does that.
        assert_eq!(interior.frontier(), [PeerId::new("x")]);
    }

    #[test]
    fn test_stop_echo_drains_frontier_and_commits_upward() {
        let (mut interior, recorder) = node("mid", &["p", "x"]);
        interior.handle(&label("p", "mid", 0));
        interior.handle(&label("p", "mid", 0));
        recorder.take();

        interior.handle(&echo("x", "mid", Command::Stop));
        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::End);
        assert_eq!(sent[0].receiver, PeerId::new("p"));
        assert!(interior.frontier().is_empty());
        assert!(interior.children().is_empty());
    }

    #[test]
    fn test_keepon_echo_keeps_child_in_frontier() {
        let (mut root, recorder) = node("root", &["a"]);
        root.handle(&init());
        recorder.take();

        root.handle(&echo("a", "root", Command::Keepon));
        let sent = recorder.take();
        // All echoed, frontier non-empty: the root starts a new round.
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Label);
        assert_eq!(root.children(), vec![PeerId::new("a")]);
        assert_eq!(root.frontier(), [PeerId::new("a")]);
    }

    #[test]
    fn test_end_echo_from_last_child_completes_root() {
        let (mut root, recorder) = node("root", &["a"]);
        root.handle(&init());
        recorder.take();

        root.handle(&echo("a", "root", Command::End));
        let sent = recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, Command::Complete);
        assert!(sent[0].receiver.is_coordinator());
        assert_eq!(root.children(), vec![PeerId::new("a")]);
    }

    #[test]
    fn test_partial_echoes_do_not_tick_a_round() {
        let (mut root, recorder) = node("root", &["a", "b"]);
        root.handle(&init());
        recorder.take();

        root.handle(&echo("a", "root", Command::Keepon));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_parent_never_changes_after_labeling() {
        let (mut interior, recorder) = node("mid", &["p", "q"]);
        interior.handle(&label("p", "mid", 0));
        interior.handle(&label("q", "mid", 3));
        recorder.take();

        assert_eq!(interior.parent(), Some(&PeerId::new("p")));
        assert_eq!(interior.tree_level(), Some(1));
    }

    #[test]
    fn test_non_algorithm_commands_are_ignored() {
        let (mut root, recorder) = node("root", &["a"]);
        root.handle(&Message::plain(
            PeerId::coordinator(),
            PeerId::new("root"),
            Command::Final,
        ));

        assert!(recorder.take().is_empty());
        assert!(!root.labeled());
    }

    #[test]
    fn test_label_without_level_is_ignored() {
        let (mut root, recorder) = node("root", &["a"]);
        root.handle(&Message::plain(
            PeerId::new("a"),
            PeerId::new("root"),
            Command::Label,
        ));

        assert!(recorder.take().is_empty());
        assert!(!root.labeled());
    }

    #[test]
    fn test_duplicate_neighbors_collapse() {
        let (node, _recorder) = node("n", &["a", "a", "b"]);
        assert_eq!(node.neighbors(), [PeerId::new("a"), PeerId::new("b")]);
    }
}
