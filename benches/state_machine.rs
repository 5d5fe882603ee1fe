use std::time::Duration;

use callbreaker::{clock, Config};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn closed_state_machine(c: &mut Criterion) {
    let state_machine = Config::new().build("bench");

    c.bench_function("closed_state_machine", |b| {
        b.iter(|| {
            black_box(state_machine.is_call_permitted());
            state_machine.on_success();
        })
    });
}

fn flapping_state_machine(c: &mut Criterion) {
    let state_machine = Config::new()
        .ring_buffer_size_in_closed_state(10)
        .ring_buffer_size_in_half_open_state(2)
        .wait_duration_in_open_state(Duration::from_secs(5))
        .build("bench");

    clock::freeze(|time| {
        c.bench_function("flapping_state_machine", |b| {
            b.iter(|| {
                time.advance(Duration::from_secs(1));
                black_box(state_machine.is_call_permitted());
                state_machine.on_success();
                state_machine.on_error();
            })
        });
    });
}

criterion_group!(benches, closed_state_machine, flapping_state_machine);
criterion_main!(benches);
