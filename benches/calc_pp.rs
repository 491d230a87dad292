use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pp_processor::{
    model::{
        beatmap::{Beatmap, DifficultyAttribute, RankedStatus},
        gamemode::Gamemode,
        mods::Mods,
        score::Score
    },
    utils::test_utils::{generate_beatmap, generate_score_row}
};

fn bench_beatmap() -> Beatmap {
    let mut beatmap = generate_beatmap(
        1,
        RankedStatus::Ranked,
        &[
            (DifficultyAttribute::Strain, 3.4),
            (DifficultyAttribute::HitWindow300, 35.0),
            (DifficultyAttribute::Aim, 2.8),
            (DifficultyAttribute::Speed, 2.4),
            (DifficultyAttribute::Od, 9.0),
            (DifficultyAttribute::Ar, 9.6),
            (DifficultyAttribute::MaxCombo, 1800.0),
        ]
    );
    beatmap.set_num_hit_circles(1100);
    beatmap
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let beatmap = bench_beatmap();

    let mut group = c.benchmark_group("score_construction");
    for mode in [Gamemode::Standard, Gamemode::Taiko, Gamemode::CatchTheBeat, Gamemode::Mania] {
        group.bench_with_input(BenchmarkId::from_parameter(mode.tag()), &mode, |b, &mode| {
            b.iter(|| {
                let row = generate_score_row(1, 1, 1400, 90, 5, 10, Mods::HIDDEN);
                Score::new(mode, row, &beatmap).total_value()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
