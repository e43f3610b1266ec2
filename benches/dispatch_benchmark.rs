//! Benchmarks for inbound frame dispatch

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use market_stream::cache::QuoteCache;
use market_stream::dispatch::Dispatcher;
use market_stream::protocol::{InboundFrame, Quote};
use market_stream::subscription::{SubscriptionRegistry, WILDCARD};

fn quote_frame(symbol: &str) -> String {
    format!(
        r#"{{"type":"quote","data":{{"symbol":"{symbol}","price":150.2,"change":1.1,"changePercent":0.74,"volume":1000000,"lastUpdated":"2024-01-15T14:30:00Z"}}}}"#
    )
}

fn dispatcher_with_handlers(per_symbol: usize, wildcard: usize) -> Dispatcher {
    let registry = Arc::new(SubscriptionRegistry::new());
    let cache = Arc::new(QuoteCache::new());

    for _ in 0..per_symbol {
        registry.insert(
            &["AAPL".to_string()],
            Arc::new(|quote: &Quote| {
                black_box(quote.volume);
            }),
        );
    }
    for _ in 0..wildcard {
        registry.insert(
            &[WILDCARD.to_string()],
            Arc::new(|quote: &Quote| {
                black_box(quote.volume);
            }),
        );
    }

    Dispatcher::new(registry, cache)
}

fn benchmark_frame_parse(c: &mut Criterion) {
    let frame = quote_frame("AAPL");

    c.bench_function("parse_quote_frame", |b| {
        b.iter(|| InboundFrame::parse(black_box(&frame)).unwrap())
    });
}

fn benchmark_dispatch(c: &mut Criterion) {
    let frame = quote_frame("AAPL");

    let single = dispatcher_with_handlers(1, 0);
    c.bench_function("dispatch_single_handler", |b| {
        b.iter(|| single.handle_frame(black_box(&frame)))
    });

    let fanout = dispatcher_with_handlers(8, 2);
    c.bench_function("dispatch_fanout_10_handlers", |b| {
        b.iter(|| fanout.handle_frame(black_box(&frame)))
    });
}

criterion_group!(benches, benchmark_frame_parse, benchmark_dispatch);
criterion_main!(benches);
