//! Randomized register traffic against the chip's timing invariants.

use atari_pokey::{MUTE_USER, NEVER, PAL_CLOCK, PolyTables, Pokey, SAMPLE_RATE};
use emu_core::{MasterClock, SampleClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One PAL frame.
const FRAME: i32 = 312 * 114;

const REGISTERS: [u8; 11] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0F];

fn random_data(rng: &mut StdRng, reg: u8) -> u8 {
    match reg {
        // Keep SKCTL out of init mode most of the time
        0x0F => {
            if rng.random_range(0..8) == 0 {
                0
            } else {
                rng.random_range(1..=3) | (rng.random::<u8>() & 0x88)
            }
        }
        _ => rng.random(),
    }
}

fn output_level(pokey: &Pokey) -> i32 {
    pokey.channels.iter().map(|ch| ch.delta.max(0)).sum()
}

#[test]
fn ticks_never_fall_behind_the_write_cycle() {
    let tables = PolyTables::new();
    let clock = SampleClock::new(MasterClock::new(PAL_CLOCK), SAMPLE_RATE);

    for seed in 0..16 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pokey = Pokey::new();
        pokey.mute(0, 0);

        let mut cycle = 0;
        while cycle < FRAME {
            let reg = REGISTERS[rng.random_range(0..REGISTERS.len())];
            let data = random_data(&mut rng, reg);
            pokey.write(reg, data, cycle, &tables, &clock);
            pokey.generate(&tables, &clock, cycle);

            for (n, ch) in pokey.channels.iter().enumerate() {
                if ch.mute != 0 {
                    assert_eq!(ch.tick_cycle, NEVER, "seed {seed}: muted channel {n} armed");
                } else {
                    assert!(
                        ch.tick_cycle >= cycle,
                        "seed {seed}: channel {n} tick {} behind cycle {cycle}",
                        ch.tick_cycle
                    );
                }
            }
            cycle += rng.random_range(1..400);
        }

        pokey.end_frame(&tables, &clock, FRAME);
        for ch in &pokey.channels {
            assert!(ch.tick_cycle >= 0, "seed {seed}: tick before the new frame");
        }
    }
}

#[test]
fn posted_deltas_sum_to_output_level() {
    let tables = PolyTables::new();
    let clock = SampleClock::new(MasterClock::new(PAL_CLOCK), SAMPLE_RATE);

    for seed in 100..116 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pokey = Pokey::new();
        pokey.mute(0, 0);

        let mut cycle = 0;
        while cycle < FRAME {
            let reg = REGISTERS[rng.random_range(0..REGISTERS.len())];
            let data = random_data(&mut rng, reg);
            pokey.write(reg, data, cycle, &tables, &clock);
            cycle += rng.random_range(1..400);
        }
        pokey.generate(&tables, &clock, FRAME);

        let posted: i32 = pokey.delta_buffer().iter().sum();
        assert_eq!(posted, output_level(&pokey), "seed {seed}");
    }
}

#[test]
fn user_mute_stops_every_channel() {
    let tables = PolyTables::new();
    let clock = SampleClock::new(MasterClock::new(PAL_CLOCK), SAMPLE_RATE);
    let mut rng = StdRng::seed_from_u64(7);
    let mut pokey = Pokey::new();
    pokey.mute(0, 0);

    for cycle in (0..FRAME).step_by(300) {
        let reg = REGISTERS[rng.random_range(0..REGISTERS.len())];
        let data = random_data(&mut rng, reg);
        pokey.write(reg, data, cycle, &tables, &clock);
    }
    pokey.generate(&tables, &clock, FRAME);
    pokey.mute(0x0F, FRAME);
    for ch in &pokey.channels {
        assert_ne!(ch.mute & MUTE_USER, 0);
        assert_eq!(ch.tick_cycle, NEVER);
    }
}
