use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bc_core::subfilter::SubFilterRegistry;
use bc_core::{CriterionKind, FilterCore, SelectorSet, StoredValue, VideoElement, VideoRecord};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

struct Card {
    record: VideoRecord,
    hidden: Cell<bool>,
    processed: Cell<bool>,
}

impl VideoElement for Card {
    fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    fn hide(&self) {
        self.hidden.set(true);
    }

    fn show(&self) {
        self.hidden.set(false);
    }

    fn is_processed(&self) -> bool {
        self.processed.get()
    }

    fn mark_processed(&self) {
        self.processed.set(true);
    }
}

fn cards(n: usize) -> Vec<Card> {
    (0..n)
        .map(|i| Card {
            record: VideoRecord {
                title_keyword: Some(format!("第{i}期 游戏实况 合集")),
                bvid: Some(format!("BV1{:09}", i)),
                uploader: Some(format!("uploader{}", i % 97)),
                duration: Some(format!("{}:{:02}", i % 20, i % 60)),
                dimension: Some(i % 5 != 0),
                coin_like_ratio: Some((i % 40) as f64 / 100.0),
            },
            hidden: Cell::new(false),
            processed: Cell::new(false),
        })
        .collect()
}

fn list(values: &[&str]) -> StoredValue {
    StoredValue::List(values.iter().map(|s| s.to_string()).collect())
}

fn core() -> FilterCore {
    let mut registry = SubFilterRegistry::new();
    registry.configure(CriterionKind::Duration, true, Some(&StoredValue::Number(60.0)));
    registry.configure(CriterionKind::Quality, true, Some(&StoredValue::Number(25.0)));
    registry.configure(CriterionKind::Uploader, true, Some(&list(&["uploader3", "uploader50"])));
    registry.configure(
        CriterionKind::TitleKeyword,
        true,
        Some(&list(&["广告", "/^第1\\d+期/", "抽奖", "/(?:开箱|测评)$/"])),
    );
    registry.configure(CriterionKind::UploaderWhitelist, true, Some(&list(&["uploader7"])));
    FilterCore::new(Rc::new(RefCell::new(registry)))
}

fn selectors() -> SelectorSet<Card> {
    SelectorSet::new()
        .with_title(|c: &Card| c.record.title_keyword.clone())
        .with_bvid(|c: &Card| c.record.bvid.clone())
        .with_uploader(|c: &Card| c.record.uploader.clone())
        .with_duration(|c: &Card| c.record.duration.clone())
        .with_dimension(|c: &Card| c.record.dimension)
        .with_coin_like_ratio(|c: &Card| c.record.coin_like_ratio)
}

fn bench_check_all(c: &mut Criterion) {
    let core = core();
    let selectors = selectors();
    let cards = cards(2000);

    c.bench_function("check_all full site 2000", |b| {
        b.iter(|| black_box(core.check_all(&cards, true, &selectors)))
    });

    c.bench_function("check_all incremental 2000", |b| {
        b.iter(|| black_box(core.check_all(&cards, false, &selectors)))
    });
}

criterion_group!(benches, bench_check_all);
criterion_main!(benches);
