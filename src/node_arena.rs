use num_derive::FromPrimitive;

// Register layout of a tree slot:
// 0 - left pointer (doubles as the free-list link while the slot is vacant)
// 1 - right pointer
// 2 - parent pointer
// 3 - color
#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
pub enum TreeField {
    Left = 0,
    Right = 1,
    Parent = 2,
    Color = 3,
}

pub const NUM_REGISTERS: usize = 4;

/// Index of the reserved nil slot. It is never handed out by the arena, its
/// registers stay zeroed, and link registers pointing at it mean "absent".
pub const SENTINEL: u32 = 0;

#[derive(Debug, Clone)]
pub struct Slot<T> {
    /// Link registers. Register 0 is reused as the free-list link while the
    /// slot is vacant.
    registers: [u32; NUM_REGISTERS],
    payload: Option<T>,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Slot {
            registers: [SENTINEL; NUM_REGISTERS],
            payload: None,
        }
    }

    fn occupied(payload: T) -> Self {
        Slot {
            registers: [SENTINEL; NUM_REGISTERS],
            payload: Some(payload),
        }
    }

    #[inline(always)]
    fn get_free_list_register(&self) -> u32 {
        self.registers[0]
    }

    #[inline(always)]
    fn set_free_list_register(&mut self, v: u32) {
        self.registers[0] = v;
    }

    #[inline(always)]
    pub fn get_register(&self, r: usize) -> u32 {
        self.registers[r]
    }

    #[inline(always)]
    pub fn set_register(&mut self, r: usize, v: u32) {
        self.registers[r] = v;
    }

    #[inline(always)]
    pub fn is_occupied(&self) -> bool {
        self.payload.is_some()
    }

    #[inline(always)]
    pub fn value(&self) -> &T {
        self.payload.as_ref().expect("vacant arena slot")
    }

    #[inline(always)]
    pub fn value_mut(&mut self) -> &mut T {
        self.payload.as_mut().expect("vacant arena slot")
    }
}

/// Growable slot storage addressed by `u32` indices. An entry keeps its index
/// for as long as it lives; nothing the arena or its callers do relocates a
/// payload between slots, which is what makes handles into the arena stable
/// across unrelated insertions and removals.
#[derive(Debug, Clone)]
pub struct NodeArena<T> {
    /// Number of occupied slots.
    size: usize,
    /// First vacant recycled slot, or `SENTINEL` when the free list is empty
    /// and new indices come from growing the slot vector.
    free_list_head: u32,
    pub(crate) slots: Vec<Slot<T>>,
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        NodeArena {
            size: 0,
            free_list_head: SENTINEL,
            slots: vec![Slot::vacant()],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline(always)]
    pub fn get(&self, i: u32) -> &Slot<T> {
        &self.slots[i as usize]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, i: u32) -> &mut Slot<T> {
        &mut self.slots[i as usize]
    }

    /// True when `i` addresses a live payload. The sentinel and vacant or
    /// out-of-range indices are not occupied.
    #[inline(always)]
    pub fn is_occupied(&self, i: u32) -> bool {
        self.slots
            .get(i as usize)
            .map_or(false, Slot::is_occupied)
    }

    /// Stores `payload` in a recycled slot when one is available, otherwise
    /// in a freshly grown one, and returns its index.
    pub fn add_node(&mut self, payload: T) -> u32 {
        let i = if self.free_list_head == SENTINEL {
            if self.slots.len() == u32::MAX as usize {
                panic!("node arena is full, size {}", self.size);
            }
            self.slots.push(Slot::occupied(payload));
            (self.slots.len() - 1) as u32
        } else {
            let i = self.free_list_head;
            self.free_list_head = self.get(i).get_free_list_register();
            let slot = self.get_mut(i);
            slot.set_free_list_register(SENTINEL);
            slot.payload = Some(payload);
            i
        };
        self.size += 1;
        i
    }

    /// Vacates slot `i` and threads it onto the free list, returning the
    /// payload. Callers MUST clear all registers first. Removing the sentinel
    /// or an already vacant slot is a no-op.
    pub fn remove_node(&mut self, i: u32) -> Option<T> {
        if i == SENTINEL || !self.is_occupied(i) {
            return None;
        }
        let free_list_head = self.free_list_head;
        let slot = self.get_mut(i);
        let payload = slot.payload.take();
        slot.set_free_list_register(free_list_head);
        self.free_list_head = i;
        self.size -= 1;
        payload
    }

    /// Drops every payload and recycled slot in one flat pass. Nothing here
    /// inspects payloads, so teardown cannot be derailed by user code.
    pub fn clear(&mut self) {
        self.slots.truncate(1);
        self.free_list_head = SENTINEL;
        self.size = 0;
    }

    /// Writes `j` into register `r_i` of node `i` and `i` into the parent
    /// register of node `j`, skipping whichever side is the sentinel.
    #[inline(always)]
    pub fn connect(&mut self, i: u32, j: u32, r_i: u32, r_j: u32) {
        if i != SENTINEL {
            self.get_mut(i).set_register(r_i as usize, j);
        }
        if j != SENTINEL {
            self.get_mut(j).set_register(r_j as usize, i);
        }
    }

    #[inline(always)]
    pub fn clear_register(&mut self, i: u32, r_i: u32) {
        self.get_mut(i).set_register(r_i as usize, SENTINEL);
    }

    #[inline(always)]
    pub fn set_register(&mut self, i: u32, value: u32, r_i: u32) {
        if i != SENTINEL {
            self.get_mut(i).set_register(r_i as usize, value);
        }
    }

    #[inline(always)]
    pub fn get_register(&self, i: u32, r_i: u32) -> u32 {
        self.get(i).get_register(r_i as usize)
    }
}

#[test]
fn test_free_list_recycles_indices() {
    let mut arena = NodeArena::<u64>::new();
    let a = arena.add_node(1);
    let b = arena.add_node(2);
    let c = arena.add_node(3);
    assert_eq!((a, b, c), (1, 2, 3));
    assert_eq!(arena.len(), 3);

    assert_eq!(arena.remove_node(b), Some(2));
    assert!(!arena.is_occupied(b));
    assert_eq!(arena.len(), 2);

    // The vacated slot is handed out again before the vector grows.
    let d = arena.add_node(4);
    assert_eq!(d, b);
    assert_eq!(*arena.get(d).value(), 4);
    assert_eq!(arena.len(), 3);

    assert_eq!(arena.remove_node(b), Some(4));
    assert_eq!(arena.remove_node(b), None);
    assert_eq!(arena.remove_node(SENTINEL), None);
}

#[test]
fn test_clear_resets_to_a_lone_sentinel() {
    let mut arena = NodeArena::<String>::new();
    for i in 0..10 {
        arena.add_node(i.to_string());
    }
    arena.clear();
    assert_eq!(arena.len(), 0);
    assert!(!arena.is_occupied(1));
    assert_eq!(arena.add_node("fresh".to_string()), 1);
}
