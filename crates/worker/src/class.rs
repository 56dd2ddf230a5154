/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work whose latency is visible to the UI-facing caller.
	Interactive,
	/// Background async work such as fetch forwarding.
	Background,
	/// Work pinned to a dedicated thread with its own runtime.
	Isolated,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::Isolated => "isolated",
		}
	}
}
