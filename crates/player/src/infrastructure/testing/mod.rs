//! Test doubles for the outbound ports plus shared fixtures.

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeGameApi, FakePushTransport, RecordingRenderer, RendererCall};
