use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_fixtures(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_fixture");
    for name in ["mixed_pdf.eml", "alternative.eml", "nested_rfc822.eml"] {
        let bytes = fixture_bytes(name);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| mimeshell::parse(bytes, mimeshell::ParseOptions::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_large_attachment(c: &mut Criterion) {
    use base64::Engine;

    let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
    let mut message = String::from(
        "Subject: big\r\nContent-Type: multipart/mixed; boundary=b\r\n\r\n\
         --b\r\nContent-Type: text/plain\r\n\r\nsee attached\r\n\
         --b\r\nContent-Type: application/octet-stream\r\n\
         Content-Transfer-Encoding: base64\r\n\r\n",
    );
    for chunk in encoded.as_bytes().chunks(76) {
        message.push_str(std::str::from_utf8(chunk).unwrap());
        message.push_str("\r\n");
    }
    message.push_str("--b--\r\n");

    let mut group = c.benchmark_group("parse_large");
    group.throughput(Throughput::Bytes(message.len() as u64));
    group.bench_function("base64_1mb", |b| {
        b.iter(|| mimeshell::parse(message.as_bytes(), mimeshell::ParseOptions::default()).unwrap())
    });
    group.finish();
}

fn bench_html_to_text(c: &mut Criterion) {
    let html = "<html><head><style>p{}</style></head><body>\
                <p>Hello <b>there</b> &amp; welcome</p><ul><li>one</li><li>two</li></ul>\
                <a href=\"https://example.com\">site</a></body></html>"
        .repeat(200);
    c.bench_function("html_to_text", |b| b.iter(|| mimeshell::text::html_to_text(&html)));
}

criterion_group!(benches, bench_parse_fixtures, bench_large_attachment, bench_html_to_text);
criterion_main!(benches);
