use criterion::{criterion_group, criterion_main};

use codec::bench_codec;

mod session;
use session::{bench_prior_edit, bench_replay};

criterion_group!(benches_codec, bench_codec);
criterion_group!(benches_session, bench_prior_edit, bench_replay);
criterion_main!(benches_codec, benches_session);
