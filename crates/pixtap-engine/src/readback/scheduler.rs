use super::{
    Alternation, FillState, FrameBufferPair, PixelExtent, PixelStore, ReadbackError,
    RenderDriver, RenderError, RenderErrorPolicy, TransferDevice,
};

/// What a tick did with the pixel store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The store now holds the frame rendered on tick `frame`.
    Published { frame: u64 },
    /// The read source held nothing from the previous tick; the store is unchanged.
    NothingToPublish,
    /// The render failed; no copies were issued and the store is unchanged.
    Skipped(RenderError),
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Slot copied to the host.
    pub read_slot: usize,
    /// Slot receiving the render target copy.
    pub write_slot: usize,
    pub outcome: TickOutcome,
}

/// Drives the render / copy-out / copy-in cycle once per external frame tick.
///
/// Owns the alternation state and is the only writer of the pixel store. The
/// store lags the most recent render by exactly one tick: tick `t` renders,
/// copies the render target into slot `next_index`, and hands the host the
/// buffer filled on tick `t - 1`. Nothing inside a tick waits on a copy issued
/// in that same tick.
pub struct ReadbackScheduler<B> {
    pair: FrameBufferPair<B>,
    alternation: Alternation,
    store: PixelStore,

    /// Host-side landing area; published to `store` only once a copy completes.
    staging: Vec<u8>,

    tick: u64,
    policy: RenderErrorPolicy,
    halted: Option<ReadbackError>,
}

impl<B> ReadbackScheduler<B> {
    /// Allocates the buffer pair and an empty pixel store.
    pub fn new<D>(
        device: &mut D,
        extent: PixelExtent,
        policy: RenderErrorPolicy,
    ) -> Result<Self, ReadbackError>
    where
        D: TransferDevice<Buffer = B> + ?Sized,
    {
        let pair = FrameBufferPair::allocate(device, extent)?;

        Ok(Self {
            pair,
            alternation: Alternation::new(),
            store: PixelStore::new(extent),
            staging: vec![0u8; extent.byte_len()],
            tick: 0,
            policy,
            halted: None,
        })
    }

    /// Consumer handle to the pixel store.
    pub fn store(&self) -> &PixelStore {
        &self.store
    }

    pub fn pair(&self) -> &FrameBufferPair<B> {
        &self.pair
    }

    pub fn alternation(&self) -> Alternation {
        self.alternation
    }

    /// Number of ticks started so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The error that stopped the loop, if any.
    pub fn halted(&self) -> Option<&ReadbackError> {
        self.halted.as_ref()
    }

    /// Runs one tick.
    ///
    /// Returns `Err` only when the loop must stop: device loss, a store
    /// invariant violation, or a render failure under `RenderErrorPolicy::Halt`.
    /// Once halted, every later call returns the same error without touching
    /// the device.
    pub fn tick<D, R>(&mut self, device: &mut D, driver: &mut R) -> Result<TickReport, ReadbackError>
    where
        D: TransferDevice<Buffer = B> + ?Sized,
        R: RenderDriver<D> + ?Sized,
    {
        if let Some(err) = &self.halted {
            return Err(err.clone());
        }

        self.tick += 1;
        self.alternation.advance();

        let tick = self.tick;
        let read_slot = self.alternation.index();
        let write_slot = self.alternation.next_index();

        let rendered = device
            .begin_tick()
            .and_then(|()| driver.render_frame(device).map_err(ReadbackError::from));

        if let Err(err) = rendered {
            device.abandon_tick();
            let render_err = match err {
                ReadbackError::Render(e) => e,
                e if e.is_fatal() => return Err(self.halt(e)),
                e => RenderError::new(e.to_string()),
            };

            if self.policy == RenderErrorPolicy::Halt {
                return Err(self.halt(ReadbackError::Render(render_err)));
            }

            log::warn!("tick {tick}: {render_err}; store left at frame {:?}", self.store.frame());
            return Ok(TickReport {
                tick,
                read_slot,
                write_slot,
                outcome: TickOutcome::Skipped(render_err),
            });
        }

        let outcome = match self.stage_copies(device, tick, read_slot, write_slot) {
            Ok(outcome) => outcome,
            Err(err) => {
                device.abandon_tick();
                return Err(self.halt(err));
            }
        };

        log::debug!("tick {tick}: read slot {read_slot}, write slot {write_slot}, {outcome:?}");

        Ok(TickReport {
            tick,
            read_slot,
            write_slot,
            outcome,
        })
    }

    fn stage_copies<D>(
        &mut self,
        device: &mut D,
        tick: u64,
        read_slot: usize,
        write_slot: usize,
    ) -> Result<TickOutcome, ReadbackError>
    where
        D: TransferDevice<Buffer = B> + ?Sized,
    {
        // Previous frame: buffer -> host.
        let source = self.pair.buffer_at_mut(read_slot);
        let outcome = match source.fill_state(tick) {
            FillState::WrittenPriorTick => {
                let frame = tick - 1;
                device.copy_buffer_to_host(source.handle_mut(), &mut self.staging)?;
                self.store.write(frame, &self.staging)?;
                TickOutcome::Published { frame }
            }
            state => {
                log::trace!("tick {tick}: slot {read_slot} is {state:?}, nothing to publish");
                TickOutcome::NothingToPublish
            }
        };

        // Current frame: render target -> buffer, consumed next tick.
        let target = self.pair.buffer_at_mut(write_slot);
        device.copy_render_target_to_buffer(target.handle_mut())?;
        target.mark_written(tick);

        device.end_tick()?;
        Ok(outcome)
    }

    fn halt(&mut self, err: ReadbackError) -> ReadbackError {
        log::error!("readback halted at tick {}: {err}", self.tick);
        self.halted = Some(err.clone());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readback::testing::{ScriptedDriver, SimDevice, StampDriver};
    use crate::readback::Rgba8;

    fn setup(w: u32, h: u32) -> (SimDevice, ReadbackScheduler<crate::readback::testing::SimBuffer>) {
        let extent = PixelExtent::rgba8(w, h).unwrap();
        let mut dev = SimDevice::new(extent);
        let sched = ReadbackScheduler::new(&mut dev, extent, RenderErrorPolicy::Skip).unwrap();
        (dev, sched)
    }

    // ── alternation ───────────────────────────────────────────────────────

    #[test]
    fn slots_alternate_strictly() {
        let (mut dev, mut sched) = setup(2, 2);
        let mut driver = StampDriver::default();

        let mut prev_read = sched.alternation().index();
        for _ in 0..64 {
            let r = sched.tick(&mut dev, &mut driver).unwrap();
            assert_ne!(r.read_slot, prev_read);
            assert_eq!(r.write_slot, 1 - r.read_slot);
            assert_eq!(sched.tick_count(), r.tick);
            assert_eq!(
                sched.pair().buffer_at(r.write_slot).fill_state(r.tick),
                FillState::WrittenThisTick
            );
            prev_read = r.read_slot;
        }
    }

    #[test]
    fn first_tick_reads_slot_one_and_writes_slot_zero() {
        let (mut dev, mut sched) = setup(2, 2);
        let r = sched.tick(&mut dev, &mut StampDriver::default()).unwrap();
        assert_eq!((r.tick, r.read_slot, r.write_slot), (1, 1, 0));
        assert_eq!(r.outcome, TickOutcome::NothingToPublish);
        assert_eq!(sched.store().frame(), None);
    }

    // ── staleness ─────────────────────────────────────────────────────────

    #[test]
    fn store_lags_render_by_exactly_one_tick() {
        let (mut dev, mut sched) = setup(3, 2);
        let mut driver = StampDriver::default();

        sched.tick(&mut dev, &mut driver).unwrap();
        for t in 2..40u64 {
            let r = sched.tick(&mut dev, &mut driver).unwrap();
            assert_eq!(r.outcome, TickOutcome::Published { frame: t - 1 });

            let (frame, bytes) = sched.store().snapshot();
            assert_eq!(frame, Some(t - 1));
            assert!(bytes.iter().all(|&b| b == (t - 1) as u8));
        }
    }

    #[test]
    fn two_tick_scenario_shows_first_frame() {
        let (mut dev, mut sched) = setup(2, 1);
        let mut driver = ScriptedDriver::new(vec![
            Ok([255, 0, 0, 255]),
            Ok([0, 255, 0, 255]),
        ]);

        sched.tick(&mut dev, &mut driver).unwrap();
        sched.tick(&mut dev, &mut driver).unwrap();

        assert_eq!(sched.store().sample_pixel(0, 0).unwrap(), Rgba8::new(255, 0, 0, 255));
        assert_eq!(sched.store().sample_pixel(1, 0).unwrap(), Rgba8::new(255, 0, 0, 255));
    }

    // ── render errors ─────────────────────────────────────────────────────

    #[test]
    fn render_error_leaves_store_unchanged_and_loop_recovers() {
        let (mut dev, mut sched) = setup(2, 2);
        let mut driver = StampDriver::failing_on(5);

        for _ in 1..=4 {
            sched.tick(&mut dev, &mut driver).unwrap();
        }
        let after_four = sched.store().snapshot();
        assert_eq!(after_four.0, Some(3));

        let r5 = sched.tick(&mut dev, &mut driver).unwrap();
        assert!(matches!(r5.outcome, TickOutcome::Skipped(_)));
        assert_eq!(sched.store().snapshot(), after_four);
        assert_eq!(dev.copies_to_host(), 3);

        // Tick 6's read source holds tick 3's frame; it is not republished.
        let r6 = sched.tick(&mut dev, &mut driver).unwrap();
        assert_eq!(r6.outcome, TickOutcome::NothingToPublish);
        assert_eq!(sched.store().snapshot(), after_four);

        let r7 = sched.tick(&mut dev, &mut driver).unwrap();
        assert_eq!(r7.outcome, TickOutcome::Published { frame: 6 });
        assert!(sched.halted().is_none());
    }

    #[test]
    fn render_error_alternation_still_toggles() {
        let (mut dev, mut sched) = setup(2, 2);
        let mut driver = StampDriver::failing_on(2);

        let r1 = sched.tick(&mut dev, &mut driver).unwrap();
        let r2 = sched.tick(&mut dev, &mut driver).unwrap();
        let r3 = sched.tick(&mut dev, &mut driver).unwrap();
        assert_ne!(r1.read_slot, r2.read_slot);
        assert_ne!(r2.read_slot, r3.read_slot);
    }

    #[test]
    fn halt_policy_stops_on_render_error() {
        let extent = PixelExtent::rgba8(2, 2).unwrap();
        let mut dev = SimDevice::new(extent);
        let mut sched = ReadbackScheduler::new(&mut dev, extent, RenderErrorPolicy::Halt).unwrap();
        let mut driver = StampDriver::failing_on(2);

        sched.tick(&mut dev, &mut driver).unwrap();
        let err = sched.tick(&mut dev, &mut driver).unwrap_err();
        assert!(matches!(err, ReadbackError::Render(_)));
        assert_eq!(sched.tick(&mut dev, &mut driver).unwrap_err(), err);
    }

    #[test]
    fn begin_tick_failure_is_a_skipped_render() {
        let (mut dev, mut sched) = setup(2, 2);
        dev.fail_begin_on(1);

        let r = sched.tick(&mut dev, &mut StampDriver::default()).unwrap();
        assert!(matches!(r.outcome, TickOutcome::Skipped(_)));
        assert_eq!(dev.abandoned_ticks(), 1);
    }

    // ── device loss ───────────────────────────────────────────────────────

    #[test]
    fn device_lost_halts_without_touching_store() {
        let (mut dev, mut sched) = setup(2, 2);
        let mut driver = StampDriver::default();

        for _ in 0..3 {
            sched.tick(&mut dev, &mut driver).unwrap();
        }
        let before = sched.store().snapshot();

        dev.lose_during_host_copy();
        let err = sched.tick(&mut dev, &mut driver).unwrap_err();
        assert!(matches!(err, ReadbackError::DeviceLost(_)));
        assert_eq!(sched.store().snapshot(), before);

        let ticks = dev.ticks_begun();
        assert!(matches!(
            sched.tick(&mut dev, &mut driver),
            Err(ReadbackError::DeviceLost(_))
        ));
        assert_eq!(dev.ticks_begun(), ticks);
    }

    #[test]
    fn allocation_error_prevents_scheduler() {
        let extent = PixelExtent::rgba8(2, 2).unwrap();
        let mut dev = SimDevice::new(extent);
        dev.fail_allocation_at(0);

        let res = ReadbackScheduler::new(&mut dev, extent, RenderErrorPolicy::Skip);
        assert!(matches!(res, Err(ReadbackError::Allocation(_))));
        assert_eq!(dev.live_buffers(), 0);
    }
}
