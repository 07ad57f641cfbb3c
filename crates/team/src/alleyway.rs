//! Corridor maps where one agent can only reach the spawn and the other can
//! only reach the delivery tile.

use courier_agent::BeliefStore;
use courier_core::Position;
use courier_grid::{Layer, Occupancy, Reachable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlleywayRole {
    /// Reaches the spawn side; fetches parcels and hands them over.
    Collector,
    /// Reaches the delivery side; takes parcels over and delivers them.
    Deliverer,
}

/// Reachability of both agents, each blocked by the other.
#[derive(Debug, Clone)]
pub struct CorridorView {
    pub whole: Reachable,
    pub mine: Reachable,
    pub theirs: Reachable,
}

impl CorridorView {
    pub fn new(beliefs: &BeliefStore, me: Position, friend: Position) -> Self {
        let map = beliefs.map();
        let whole = map.reachable_from(me, Layer::Static);
        let mine = map.reachable_from(me, Layer::Live);

        let mut their_map = map.clone();
        their_map.mark_occupied(me, Occupancy::Agent);
        let theirs = their_map.reachable_from(friend, Layer::Live);

        Self {
            whole,
            mine,
            theirs,
        }
    }

    /// One spawn and one delivery tile on the whole map, and the two agents
    /// cut each other off from different ones.
    pub fn is_alleyway(&self) -> bool {
        if self.whole.spawn_tiles.len() != 1 || self.whole.delivery_tiles.len() != 1 {
            return false;
        }
        self.mine.spawn_tiles.len() != self.theirs.spawn_tiles.len()
            && self.mine.delivery_tiles.len() != self.theirs.delivery_tiles.len()
    }

    pub fn role(&self) -> AlleywayRole {
        if self.mine.delivery_tiles.is_empty() {
            AlleywayRole::Collector
        } else {
            AlleywayRole::Deliverer
        }
    }

    pub fn delivery(&self) -> Option<Position> {
        self.whole.delivery_tiles.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_agent::{AgentSighting, SelfReport};
    use courier_core::{AgentId, AgentSettings, Timestamp};
    use courier_grid::WorldMap;

    fn beliefs_with(rows: &str, me: (f64, f64), friend: (f64, f64)) -> BeliefStore {
        let mut beliefs = BeliefStore::new(AgentSettings::default());
        beliefs.set_map(WorldMap::from_ascii(rows, 5).unwrap());
        beliefs.update_self(
            SelfReport {
                id: AgentId::new("me"),
                x: Some(me.0),
                y: Some(me.1),
                ..SelfReport::default()
            },
            Timestamp::from_millis(0),
        );
        beliefs.update_agents(
            vec![AgentSighting::new("friend", friend.0, friend.1)],
            Timestamp::from_millis(0),
        );
        beliefs
    }

    #[test]
    fn test_shared_corridor_is_an_alleyway() {
        let beliefs = beliefs_with("S.....D", (1.0, 0.0), (4.0, 0.0));
        let view = CorridorView::new(&beliefs, Position::new(1, 0), Position::new(4, 0));

        assert_eq!(view.whole.spawn_tiles.len(), 1);
        assert_eq!(view.whole.delivery_tiles.len(), 1);
        assert!(view.is_alleyway());
        assert_eq!(view.role(), AlleywayRole::Collector);
        assert_eq!(view.delivery(), Some(Position::new(6, 0)));
    }

    #[test]
    fn test_deliverer_side() {
        let beliefs = beliefs_with("S.....D", (4.0, 0.0), (1.0, 0.0));
        let view = CorridorView::new(&beliefs, Position::new(4, 0), Position::new(1, 0));
        assert!(view.is_alleyway());
        assert_eq!(view.role(), AlleywayRole::Deliverer);
    }

    #[test]
    fn test_open_map_is_not_an_alleyway() {
        let beliefs = beliefs_with("S.....D\n.......", (1.0, 0.0), (4.0, 0.0));
        let view = CorridorView::new(&beliefs, Position::new(1, 0), Position::new(4, 0));
        assert!(!view.is_alleyway());
    }

    #[test]
    fn test_many_spawns_is_not_an_alleyway() {
        let beliefs = beliefs_with("SS....D", (2.0, 0.0), (4.0, 0.0));
        let view = CorridorView::new(&beliefs, Position::new(2, 0), Position::new(4, 0));
        assert!(!view.is_alleyway());
    }
}
