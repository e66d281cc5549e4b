use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use crdt_document::array::CRDTArray;
use crdt_document::element::Element;
use crdt_document::primitive::Primitive;
use crdt_document::time::{ActorID, TimeTicket};

fn ticket(lamport: u64) -> TimeTicket {
    TimeTicket::new(lamport, 0, ActorID(1))
}

fn bench_insert_chain(c: &mut Criterion) {
    let sizes = [100u64, 1_000, 10_000];
    let mut group = c.benchmark_group("insert_chain");

    for size in sizes {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter_batched(
                CRDTArray::default,
                |mut array| {
                    let mut last = None;
                    for i in 0..n {
                        let id = ticket(i + 1);
                        array.insert_after(last, Element::primitive(id, Primitive::Int64(i as i64)));
                        last = Some(id);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_move_siblings(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_siblings");
    group.bench_function("move_first_to_front", |b| {
        b.iter_batched(
            || {
                let mut array = CRDTArray::default();
                let mut last = None;
                for i in 0..1_000u64 {
                    let id = ticket(i + 1);
                    array.insert_after(last, Element::primitive(id, Primitive::Int64(i as i64)));
                    last = Some(id);
                }
                array
            },
            |mut array| {
                let first = ticket(1);
                let move_at = ticket(2_000);
                array.move_front(first, move_at);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(core, bench_insert_chain, bench_move_siblings);
criterion_main!(core);
