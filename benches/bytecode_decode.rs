//! Bytecode decoding benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xpuvm::bytecode::{disassemble, BytecodeBuilder, BytecodeProgram, Instruction, LaunchArg};

fn program(launches: u32) -> BytecodeProgram {
    let mut builder = BytecodeBuilder::new().context(0).begin().alloc(0, &[0, 1, 2]);
    for i in 0..launches {
        builder = builder
            .transfer_h2d_always(0, Some(0), 0, 0)
            .launch(
                i,
                0,
                Some(0),
                0,
                256,
                &[LaunchArg::Reference(0), LaunchArg::Reference(1), LaunchArg::Constant(0)],
            )
            .add_dependency(Some(1))
            .transfer_d2h_always(2, Some(1), 0, 0);
    }
    builder.end().finish()
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for launches in [16u32, 256, 4_096] {
        let mut program = program(launches);
        group.throughput(Throughput::Bytes(program.len() as u64));

        group.bench_with_input(BenchmarkId::new("instructions", launches), &launches, |b, _| {
            b.iter(|| {
                program.rewind();
                let _ = program.read_header().unwrap();
                while program.has_remaining() {
                    black_box(Instruction::decode(&mut program).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("disassemble", launches), &launches, |b, _| {
            b.iter(|| black_box(disassemble(&program).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode);
criterion_main!(benches);
