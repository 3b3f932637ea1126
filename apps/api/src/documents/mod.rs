// Documents: one tailored application per (source resume, job posting).
// Phase tracking lives here; section generation lives in `sections`.

pub mod handlers;
pub mod phase;
