use std::io;
use std::sync::mpsc::channel;
use std::thread;

use callbreaker::{decorate_call, Call, Config, FnCall, Response};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::StatusCode;

fn dangerous_call(
    n: usize,
) -> FnCall<usize, usize, io::Error, impl Fn(&usize) -> Result<Response<usize>, io::Error>> {
    FnCall::new(n, |n: &usize| {
        if n % 5 == 0 {
            Ok(Response::new(StatusCode::INTERNAL_SERVER_ERROR, *n))
        } else {
            Ok(Response::ok(*n))
        }
    })
}

fn single_threaded(c: &mut Criterion) {
    let breaker = Config::new().build("bench");
    let mut n = 0;

    c.bench_function("single_threaded", |b| {
        b.iter(|| {
            match decorate_call(breaker.clone(), dangerous_call(n)).execute() {
                Ok(response) => {
                    black_box(response);
                }
                Err(err) if err.is_rejected() => {}
                Err(err) => unreachable!("{:?}", err),
            }
            n += 1;
        })
    });
}

fn multi_threaded_in_batch(c: &mut Criterion) {
    let breaker = Config::new().build("bench");
    let batch_size = 10;

    c.bench_function("multi_threaded_in_batch", |b| {
        b.iter(|| {
            let (tx, rx) = channel();

            for n in 0..batch_size {
                let breaker = breaker.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    let res = match decorate_call(breaker, dangerous_call(n)).execute() {
                        Ok(response) => response.into_body(),
                        Err(_) => n,
                    };
                    tx.send(res).unwrap();
                });
            }

            drop(tx);

            let res: usize = rx.iter().sum();
            assert_eq!(45, res);
        })
    });
}

criterion_group!(benches, single_threaded, multi_threaded_in_batch);
criterion_main!(benches);
