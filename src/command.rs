use crate::chain::NoiseChain;
use crate::presets::ChainConfig;

/// Control-thread to render-thread messages. Chains are built on the control
/// side and handed over whole, so the audio callback never touches the
/// preset table or a decoder.
pub enum Command {
    /// Install a freshly built chain, replacing any current one after a
    /// short mute
    ReplaceChain(NoiseChain),
    /// In-place intensity update for the installed chain; ignored by
    /// real-recording chains and on mode mismatch
    Retune(ChainConfig),
    /// New master gain target (volume-curve mapped), smoothed on the render side
    SetGain(f32),
    /// Ramp the output to silence over the given seconds, then tear down
    FadeOut(f32),
    /// Immediate teardown: gain hard-set to zero, chain dropped
    Stop,
}
