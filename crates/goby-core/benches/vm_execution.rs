use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use goby_bytecode::{assemble, Program};
use goby_core::{Vm, VmOptions};

/// `i = 0; sum = 0; while i < n; sum += i; i += 1; end; sum`
fn counting_loop(n: i64) -> Program {
    let source = format!(
        "<ProgramStart>
0 putobject 0
1 setlocal 0 0
2 putobject 0
3 setlocal 0 1
4 getlocal 0 0
5 putobject {}
6 send < 1
7 branchunless 17
8 getlocal 0 1
9 getlocal 0 0
10 send + 1
11 setlocal 0 1
12 getlocal 0 0
13 putobject 1
14 send + 1
15 setlocal 0 0
16 jump 4
17 getlocal 0 1
18 leave
",
        n
    );
    assemble("bench.gb", &source).unwrap()
}

/// `def fib(n); n < 2 ? n : fib(n - 1) + fib(n - 2); end; fib(n)`
fn fib(n: i64) -> Program {
    let source = format!(
        "<Def:fib>
params: n
0 getlocal 0 0
1 putobject 2
2 send < 1
3 branchunless 6
4 getlocal 0 0
5 leave
6 putself
7 getlocal 0 0
8 putobject 1
9 send - 1
10 send fib 1
11 putself
12 getlocal 0 0
13 putobject 2
14 send - 1
15 send fib 1
16 send + 1
17 leave
<ProgramStart>
putself
putstring fib
def_method 1
putself
putobject {}
send fib 1
leave
",
        n
    );
    assemble("bench.gb", &source).unwrap()
}

/// `sum = 0; n.times { |i| sum += i }; sum`
fn block_yield(n: i64) -> Program {
    let source = format!(
        "<Block:0>
getlocal 1 0
getlocal 0 0
send + 1
setlocal 1 0
leave
<ProgramStart>
putobject 0
setlocal 0 0
putobject {}
send times 0 block:0
pop
getlocal 0 0
leave
",
        n
    );
    assemble("bench.gb", &source).unwrap()
}

fn run(program: &Program) -> Option<i64> {
    let mut vm = Vm::with_options(VmOptions::test());
    vm.exec_program(program.clone()).unwrap();
    vm.get_exec_result().and_then(|v| v.as_int())
}

fn bench_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop");
    for n in [100, 10_000] {
        let program = counting_loop(n);
        group.bench_with_input(BenchmarkId::new("while", n), &program, |b, program| {
            b.iter(|| run(black_box(program)));
        });
    }
    group.finish();
}

fn bench_calls(c: &mut Criterion) {
    let program = fib(15);
    c.bench_function("fib_15", |b| {
        b.iter(|| run(black_box(&program)));
    });
}

fn bench_blocks(c: &mut Criterion) {
    let program = block_yield(1_000);
    c.bench_function("times_1000", |b| {
        b.iter(|| run(black_box(&program)));
    });
}

fn bench_assemble(c: &mut Criterion) {
    let listing = fib(20).to_string();
    c.bench_function("assemble_fib", |b| {
        b.iter(|| assemble("bench.gb", black_box(&listing)).unwrap());
    });
}

criterion_group!(benches, bench_loop, bench_calls, bench_blocks, bench_assemble);
criterion_main!(benches);
