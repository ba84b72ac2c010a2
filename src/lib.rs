pub mod basin;
pub mod index;
pub mod io;
pub mod multiplex;
pub mod trace;

pub use basin::{
    Basin, BasinConstraints, BasinError, BasinMember, DepthStats, ReverseIndex, map_basin,
    map_basins,
};
pub use index::{IndexStats, Lookup, PageId, RawPair, SuccessorIndex};
pub use multiplex::{
    BasinRecord, MultiplexError, MultiplexTable, TunnelRow, TunnelType, assemble,
};
pub use trace::{CycleKey, TerminalKind, Trace, discover_cycles, sample_traces, trace};
