mod gate;
mod navigator;
mod profiles;
mod session;

pub use gate::Gate;
pub use navigator::RecordingNavigator;
pub use profiles::FakeProfileStore;
pub use session::FakeSessionProvider;

/// Let spawned tasks on the current-thread test runtime run to quiescence.
///
/// Yields instead of sleeping so paused-clock tests do not auto-advance time.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
