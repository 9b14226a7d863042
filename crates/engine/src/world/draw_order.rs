use super::entity::EntityId;

pub(crate) type NodeId = usize;

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    next: Option<NodeId>,
    prev: Option<NodeId>,
    update_next: Option<NodeId>,
    linked: bool,
}

/// Paint order for every linked entity, kept as one doubly linked chain.
///
/// Node layout: `layer_count` layer heads, then one sentinel per grid row, then
/// one node per entity id. Ordinary entities sit right after their layer head.
/// Solids sit in the row-sentinel chain spliced between head `solid_layer` and
/// head `solid_layer + 1`, each just before the sentinel of its row, which keeps
/// them sorted by row without any per-frame sort.
#[derive(Debug, Clone)]
pub struct DrawOrderList {
    layer_count: usize,
    row_count: usize,
    nodes: Vec<Links>,
}

/// Position on the update chain captured by the last paint pass.
#[derive(Debug, Clone, Copy)]
pub struct UpdateCursor {
    node: Option<NodeId>,
}

impl DrawOrderList {
    pub const MIN_Z_WIDTH: usize = 2;

    pub fn new(z_width: usize, row_count: u32) -> Self {
        let z_width = z_width.max(Self::MIN_Z_WIDTH);
        let layer_count = z_width + 1;
        let row_count = row_count as usize;
        let mut list = Self {
            layer_count,
            row_count,
            nodes: vec![Links::default(); layer_count + row_count],
        };
        list.reset();
        list
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Reserved layer that holds the row-sentinel chain.
    pub fn solid_layer(&self) -> usize {
        (self.layer_count - 1) / 2
    }

    pub fn sentinel_count(&self) -> usize {
        self.layer_count + self.row_count
    }

    pub(crate) fn node_of(&self, id: EntityId) -> NodeId {
        self.sentinel_count() + id.index()
    }

    fn entity_of(&self, node: NodeId) -> Option<EntityId> {
        node.checked_sub(self.sentinel_count())
            .map(|index| EntityId(index as u64))
    }

    fn row_sentinel(&self, row: usize) -> NodeId {
        self.layer_count + row
    }

    pub fn is_linked(&self, id: EntityId) -> bool {
        self.nodes
            .get(self.node_of(id))
            .is_some_and(|links| links.linked)
    }

    /// Inserts right after the layer head, so the newest entity on a layer
    /// paints first within that layer.
    pub fn insert_ordinary(&mut self, id: EntityId, layer: usize) -> bool {
        if layer >= self.layer_count || self.is_linked(id) {
            return false;
        }
        let node = self.ensure_node(id);
        self.splice_after(node, layer);
        true
    }

    /// Inserts immediately before the sentinel of `row`.
    pub fn insert_solid(&mut self, id: EntityId, row: u32) -> bool {
        let row = row as usize;
        if row >= self.row_count || self.is_linked(id) {
            return false;
        }
        let node = self.ensure_node(id);
        self.splice_before(node, self.row_sentinel(row));
        true
    }

    pub fn unlink(&mut self, id: EntityId) -> bool {
        if !self.is_linked(id) {
            return false;
        }
        let node = self.node_of(id);
        self.detach(node);
        true
    }

    pub fn relocate_solid_row(&mut self, id: EntityId, new_row: u32) -> bool {
        if new_row as usize >= self.row_count || !self.unlink(id) {
            return false;
        }
        self.insert_solid(id, new_row)
    }

    /// Drops every entity from the chain and rebuilds heads and sentinels.
    /// The update snapshot is rebuilt too, so an update pass in flight stops.
    pub fn reset(&mut self) {
        for links in &mut self.nodes {
            *links = Links::default();
        }
        let solid_layer = self.solid_layer();
        let mut order: Vec<NodeId> = (0..=solid_layer).collect();
        order.extend((0..self.row_count).map(|row| self.row_sentinel(row)));
        order.extend(solid_layer + 1..self.layer_count);

        for pair in order.windows(2) {
            self.nodes[pair[0]].next = Some(pair[1]);
            self.nodes[pair[1]].prev = Some(pair[0]);
        }
        for node in order {
            self.nodes[node].linked = true;
        }
        self.snapshot_update_order();
    }

    /// Entities in paint order (back to front).
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        let mut cursor = Some(0);
        std::iter::from_fn(move || {
            while let Some(node) = cursor {
                cursor = self.nodes[node].next;
                if let Some(id) = self.entity_of(node) {
                    return Some(id);
                }
            }
            None
        })
    }

    /// Copies the current paint order into the update chain.
    pub fn snapshot_update_order(&mut self) {
        for links in &mut self.nodes {
            links.update_next = links.next;
        }
    }

    pub fn update_cursor(&self) -> UpdateCursor {
        UpdateCursor { node: Some(0) }
    }

    /// Next entity on the update chain. The chain may name entities that have
    /// since been unlinked; callers check before acting.
    pub fn next_for_update(&self, cursor: &mut UpdateCursor) -> Option<EntityId> {
        while let Some(node) = cursor.node {
            cursor.node = self.nodes.get(node).and_then(|links| links.update_next);
            if let Some(id) = self.entity_of(node) {
                return Some(id);
            }
        }
        None
    }

    fn ensure_node(&mut self, id: EntityId) -> NodeId {
        let node = self.node_of(id);
        if node >= self.nodes.len() {
            self.nodes.resize(node + 1, Links::default());
        }
        node
    }

    fn splice_after(&mut self, node: NodeId, anchor: NodeId) {
        let after = self.nodes[anchor].next;
        self.nodes[node] = Links {
            next: after,
            prev: Some(anchor),
            update_next: self.nodes[node].update_next,
            linked: true,
        };
        self.nodes[anchor].next = Some(node);
        if let Some(after) = after {
            self.nodes[after].prev = Some(node);
        }
    }

    fn splice_before(&mut self, node: NodeId, anchor: NodeId) {
        match self.nodes[anchor].prev {
            Some(before) => self.splice_after(node, before),
            None => {
                self.nodes[node] = Links {
                    next: Some(anchor),
                    prev: None,
                    update_next: self.nodes[node].update_next,
                    linked: true,
                };
                self.nodes[anchor].prev = Some(node);
            }
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Links { next, prev, .. } = self.nodes[node];
        if let Some(prev) = prev {
            self.nodes[prev].next = next;
        }
        if let Some(next) = next {
            self.nodes[next].prev = prev;
        }
        let links = &mut self.nodes[node];
        links.next = None;
        links.prev = None;
        links.linked = false;
    }

    #[cfg(test)]
    pub(crate) fn links_are_consistent(&self) -> bool {
        let mut seen = 0;
        let mut prev = None;
        let mut cursor = Some(0);
        while let Some(node) = cursor {
            let links = self.nodes[node];
            if !links.linked || links.prev != prev {
                return false;
            }
            seen += 1;
            prev = Some(node);
            cursor = links.next;
        }
        seen == self.nodes.iter().filter(|links| links.linked).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_width_is_clamped_and_solid_layer_sits_in_the_middle() {
        let list = DrawOrderList::new(0, 4);
        assert_eq!(list.layer_count(), 3);
        assert_eq!(list.solid_layer(), 1);

        let wide = DrawOrderList::new(6, 4);
        assert_eq!(wide.layer_count(), 7);
        assert_eq!(wide.solid_layer(), 3);
        assert_eq!(wide.sentinel_count(), 11);
        assert!(wide.links_are_consistent());
    }

    #[test]
    fn ordinary_entities_are_newest_first_within_a_layer() {
        let mut list = DrawOrderList::new(4, 3);
        assert!(list.insert_ordinary(EntityId(0), 1));
        assert!(list.insert_ordinary(EntityId(1), 1));
        assert!(list.insert_ordinary(EntityId(2), 0));

        let order: Vec<_> = list.iter().collect();
        assert_eq!(order, vec![EntityId(2), EntityId(1), EntityId(0)]);
        assert!(list.links_are_consistent());
    }

    #[test]
    fn solids_sort_by_row_between_the_surrounding_layers() {
        let mut list = DrawOrderList::new(2, 4);
        list.insert_ordinary(EntityId(0), 2);
        list.insert_solid(EntityId(1), 3);
        list.insert_solid(EntityId(2), 0);
        list.insert_ordinary(EntityId(3), 0);
        list.insert_solid(EntityId(4), 1);

        let order: Vec<_> = list.iter().collect();
        assert_eq!(
            order,
            vec![EntityId(3), EntityId(2), EntityId(4), EntityId(1), EntityId(0)]
        );
    }

    #[test]
    fn relocate_moves_a_solid_to_its_new_row() {
        let mut list = DrawOrderList::new(2, 4);
        list.insert_solid(EntityId(0), 1);
        list.insert_solid(EntityId(1), 2);
        assert!(list.relocate_solid_row(EntityId(0), 3));

        let order: Vec<_> = list.iter().collect();
        assert_eq!(order, vec![EntityId(1), EntityId(0)]);
        assert!(list.links_are_consistent());
    }

    #[test]
    fn unlink_is_idempotent_and_relinking_is_rejected_while_linked() {
        let mut list = DrawOrderList::new(2, 2);
        assert!(list.insert_ordinary(EntityId(5), 0));
        assert!(!list.insert_ordinary(EntityId(5), 2));
        assert!(list.unlink(EntityId(5)));
        assert!(!list.unlink(EntityId(5)));
        assert!(!list.unlink(EntityId(9)));
        assert_eq!(list.iter().count(), 0);
        assert!(list.links_are_consistent());
    }

    #[test]
    fn update_chain_follows_the_last_snapshot_only() {
        let mut list = DrawOrderList::new(2, 2);
        list.insert_ordinary(EntityId(0), 0);
        list.snapshot_update_order();
        list.insert_ordinary(EntityId(1), 0);

        let mut cursor = list.update_cursor();
        let mut visited = Vec::new();
        while let Some(id) = list.next_for_update(&mut cursor) {
            visited.push(id);
        }
        assert_eq!(visited, vec![EntityId(0)]);

        list.snapshot_update_order();
        let mut cursor = list.update_cursor();
        let mut visited = Vec::new();
        while let Some(id) = list.next_for_update(&mut cursor) {
            visited.push(id);
        }
        assert_eq!(visited, vec![EntityId(1), EntityId(0)]);
    }

    #[test]
    fn reset_drops_every_entity() {
        let mut list = DrawOrderList::new(2, 3);
        list.insert_ordinary(EntityId(0), 0);
        list.insert_solid(EntityId(1), 2);
        list.reset();

        assert_eq!(list.iter().count(), 0);
        assert!(!list.is_linked(EntityId(0)));
        assert!(list.insert_solid(EntityId(1), 0));
        assert!(list.links_are_consistent());
    }
}
