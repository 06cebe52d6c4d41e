//! Cross-thread behaviour of the primitives, run under every strategy.

use std::sync::Arc;
use std::time::Duration;

use monorail::{Barrier, BoundedChannel, Channel, Condition, Runtime, Semaphore, StrategyKind};

fn on_every_strategy(scenario: fn(&Runtime)) {
    for strategy in StrategyKind::ALL {
        let runtime = Runtime::with_strategy(strategy);
        let rt = runtime.clone();
        runtime.run(move || scenario(&rt)).unwrap();
    }
}

#[test]
fn test_bounded_channel_third_send_blocks() {
    on_every_strategy(|rt| {
        let channel = Arc::new(BoundedChannel::<i32>::new(rt, 2));
        channel.send(1);
        channel.send(2);

        let sender = {
            let channel = Arc::clone(&channel);
            rt.spawn(move || channel.send(3)).unwrap()
        };
        while channel.waiting_senders() == 0 {
            rt.yield_now();
        }
        // Still blocked after giving it every chance to run.
        rt.sleep(Duration::from_millis(5));
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.waiting_senders(), 1);

        assert_eq!(channel.receive(), 1);
        assert_eq!(channel.receive(), 2);
        assert_eq!(channel.receive(), 3);
        sender.join().unwrap();
    });
}

#[test]
fn test_channel_many_producers_many_consumers() {
    const PRODUCERS: usize = 3;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 200;

    on_every_strategy(|rt| {
        let channel: Arc<Channel<Option<(usize, usize)>>> = Arc::new(Channel::new(rt));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let channel = Arc::clone(&channel);
                let inner = rt.clone();
                rt.spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        channel.send(Some((p, seq)));
                        if seq % 17 == 0 {
                            inner.yield_now();
                        }
                    }
                })
                .unwrap()
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let channel = Arc::clone(&channel);
                rt.spawn(move || {
                    let mut got = Vec::new();
                    while let Some(item) = channel.receive() {
                        got.push(item);
                    }
                    got
                })
                .unwrap()
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        for _ in 0..CONSUMERS {
            channel.send(None);
        }

        let mut seen = vec![vec![false; PER_PRODUCER]; PRODUCERS];
        for consumer in consumers {
            let got = consumer.join().unwrap();
            let mut last = vec![None; PRODUCERS];
            for (p, seq) in got {
                assert!(!seen[p][seq], "({p}, {seq}) delivered twice");
                seen[p][seq] = true;
                // Per-producer order survives within each consumer.
                assert!(last[p].map_or(true, |prev| prev < seq));
                last[p] = Some(seq);
            }
        }
        assert!(seen.iter().flatten().all(|&s| s));
        assert!(channel.is_empty());
    });
}

#[test]
fn test_semaphore_limits_holders() {
    on_every_strategy(|rt| {
        let permits = 2;
        let sem = Arc::new(Semaphore::new(rt, permits));
        let holders = Arc::new(rt.exclusive((0usize, 0usize)));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let holders = Arc::clone(&holders);
                let inner = rt.clone();
                rt.spawn(move || {
                    sem.wait();
                    holders.with(|(now, peak)| {
                        *now += 1;
                        *peak = (*peak).max(*now);
                    });
                    inner.sleep(Duration::from_millis(2));
                    holders.with(|(now, _)| *now -= 1);
                    sem.post();
                })
                .unwrap()
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        let (now, peak) = holders.with(|h| *h);
        assert_eq!(now, 0);
        assert!(peak <= permits, "peak {peak} exceeds {permits} permits");
        assert_eq!(sem.available(), permits);
    });
}

#[test]
fn test_barrier_rounds_with_reset() {
    on_every_strategy(|rt| {
        let parties = 4;
        let barrier = Arc::new(Barrier::new(rt, parties));
        let arrivals = Arc::new(rt.exclusive(0usize));

        for _round in 0..3 {
            let workers: Vec<_> = (0..parties - 1)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let arrivals = Arc::clone(&arrivals);
                    rt.spawn(move || {
                        arrivals.with(|a| *a += 1);
                        barrier.arrive();
                    })
                    .unwrap()
                })
                .collect();

            while barrier.waiting() < parties - 1 {
                rt.yield_now();
            }
            barrier.arrive();
            for worker in workers {
                worker.join().unwrap();
            }
            // Open now: late arrivals pass straight through.
            barrier.arrive();
            assert_eq!(barrier.outstanding(), 0);
            barrier.reset(parties);
        }
        assert_eq!(arrivals.with(|a| *a), 3 * (parties - 1));
    });
}

#[test]
fn test_condition_signal_order_and_broadcast() {
    on_every_strategy(|rt| {
        let cond = Arc::new(Condition::new(rt));
        let woken = Arc::new(rt.exclusive(Vec::new()));

        let mut waiters = Vec::new();
        for tag in 0..4usize {
            let waiter_cond = Arc::clone(&cond);
            let waiter_woken = Arc::clone(&woken);
            waiters.push(
                rt.spawn(move || {
                    waiter_cond.wait();
                    waiter_woken.with(|w| w.push(tag));
                })
                .unwrap(),
            );
            while cond.waiting() <= tag {
                rt.yield_now();
            }
        }

        for served in 0..2 {
            cond.signal();
            while !waiters[served].is_finished() {
                rt.yield_now();
            }
        }
        assert_eq!(woken.with(|w| w.clone()), vec![0, 1]);
        assert_eq!(cond.waiting(), 2);

        cond.broadcast();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        let mut rest = woken.with(|w| w[2..].to_vec());
        rest.sort_unstable();
        assert_eq!(rest, vec![2, 3]);
    });
}

#[test]
fn test_channel_readers_served_in_registration_order() {
    on_every_strategy(|rt| {
        let channel = Arc::new(Channel::new(rt));
        let served = Arc::new(rt.exclusive(Vec::new()));

        let mut readers = Vec::new();
        for tag in 0..4usize {
            let reader_channel = Arc::clone(&channel);
            let reader_served = Arc::clone(&served);
            readers.push(
                rt.spawn(move || {
                    let value: usize = reader_channel.receive();
                    reader_served.with(|s| s.push((tag, value)));
                })
                .unwrap(),
            );
            while channel.waiting_readers() <= tag {
                rt.yield_now();
            }
        }

        for (value, reader) in readers.iter().enumerate() {
            channel.send(value * 10);
            while !reader.is_finished() {
                rt.yield_now();
            }
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(
            served.with(|s| s.clone()),
            vec![(0, 0), (1, 10), (2, 20), (3, 30)]
        );
    });
}
