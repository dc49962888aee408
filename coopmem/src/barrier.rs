use parking_lot::{Condvar, Mutex};

/// Generation-counted rendezvous. Reusable across any number of phases;
/// the generation bump distinguishes consecutive barriers so a fast node
/// cannot lap a slow one.
pub(crate) struct Barrier {
    num_nodes: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

struct State {
    arrived: usize,
    generation: u64,
}

impl Barrier {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Barrier {
            num_nodes,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Blocks until all nodes have arrived. The mutex hand-off also orders
    /// memory: writes made before the call on any node are visible to every
    /// node after it returns.
    pub(crate) fn wait(&self) {
        let mut st = self.state.lock();
        st.arrived += 1;
        if st.arrived == self.num_nodes {
            st.arrived = 0;
            st.generation = st.generation.wrapping_add(1);
            self.cvar.notify_all();
        } else {
            let gen = st.generation;
            while st.generation == gen {
                self.cvar.wait(&mut st);
            }
        }
    }
}
