use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use minidb::{Database, Value};
use std::hint::black_box;

const SIZES: [usize; 2] = [1_000, 10_000];

/// 100 suppliers and `n` orders, a fifth of which reference no supplier.
fn setup_populated_db(n: usize) -> Database {
    let mut db = Database::new();
    db.execute("CREATE TABLE suppliers (supplier_id INT PRIMARY KEY, supplier_name VARCHAR)")
        .unwrap();
    db.execute(
        "CREATE TABLE orders (order_id INT PRIMARY KEY, supplier_id INT, \
         order_date VARCHAR, paid BOOL)",
    )
    .unwrap();

    let suppliers = db.get_table_mut("suppliers").unwrap();
    for id in 0..100 {
        suppliers
            .insert(vec![Value::Int(id), Value::from(format!("supplier{id}"))])
            .unwrap();
    }

    let orders = db.get_table_mut("orders").unwrap();
    for i in 0..n as i64 {
        orders
            .insert(vec![
                Value::Int(i),
                Value::Int(i % 125),
                Value::from(format!("{:02}.01.2017", i % 28 + 1)),
                Value::Bool(i % 2 == 0),
            ])
            .unwrap();
    }
    db
}

/// Read-only query over populated databases of every size in [SIZES].
fn query_scaling(c: &mut Criterion, group_name: &str, sql: &str) {
    let mut group = c.benchmark_group(group_name);
    for n in SIZES {
        let db = setup_populated_db(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &db, |b, db| {
            b.iter(|| black_box(db.query(black_box(sql)).unwrap()));
        });
    }
    group.finish();
}

/// Mutating statement, each iteration on a freshly populated database.
fn mutation_scaling(c: &mut Criterion, group_name: &str, sql: &str) {
    let mut group = c.benchmark_group(group_name);
    for n in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_with_setup(
                || setup_populated_db(n),
                |mut db| {
                    db.execute(sql).unwrap();
                    black_box(db);
                },
            );
        });
    }
    group.finish();
}

fn bench_insert_sql(c: &mut Criterion) {
    c.bench_function("insert_row_with_column_list", |b| {
        let mut db = Database::new();
        db.execute("CREATE TABLE log (id INT, note VARCHAR, ok BOOL)")
            .unwrap();
        b.iter(|| {
            db.execute(black_box(
                "INSERT INTO log (note, ok, id) VALUES (\"disk full\", false, 42)",
            ))
            .unwrap();
        });
    });
}

fn bench_where(c: &mut Criterion) {
    query_scaling(
        c,
        "Select_Where_Brackets",
        "SELECT * FROM orders WHERE (supplier_id = 42 OR supplier_id > 110) AND paid = true",
    );
}

fn bench_joins(c: &mut Criterion) {
    query_scaling(
        c,
        "Left_Join",
        "SELECT supplier_name, order_id FROM suppliers \
         LEFT JOIN orders ON suppliers.supplier_id = orders.supplier_id",
    );
    query_scaling(
        c,
        "Right_Join_Where",
        "SELECT supplier_name, order_id, paid FROM suppliers \
         RIGHT JOIN orders ON suppliers.supplier_id = orders.supplier_id WHERE paid = false",
    );
}

fn bench_mutations(c: &mut Criterion) {
    mutation_scaling(
        c,
        "Update_Where",
        "UPDATE orders SET supplier_id = 99, order_date = \"31.12.2017\" WHERE paid = true",
    );
    mutation_scaling(c, "Delete_Where", "DELETE FROM orders WHERE supplier_id > 90");
}

criterion_group!(
    benches,
    bench_insert_sql,
    bench_where,
    bench_joins,
    bench_mutations
);
criterion_main!(benches);
