// chunkflow/examples/csv_import.rs
//
// The classic batch job: a headered customer CSV imported into an
// upsert-by-id repository sink, chunk size 10, four pooled workers.

use async_trait::async_trait;
use chunkflow::{
  BatchResult, DelimitedLineTokenizer, FlatFileSource, Flow, InMemoryLedger, ItemSink, ItemTransformer, JobBuilder,
  StepBuilder,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

// 1. Define the record flowing through the pipeline
#[derive(Debug, Clone)]
struct Customer {
  id: i32,
  first_name: String,
  last_name: String,
  email: String,
  country: String,
}

// 2. A transformer normalizing emails; filtering would return Ok(None)
struct NormalizeEmail;

#[async_trait]
impl ItemTransformer for NormalizeEmail {
  type Input = Customer;
  type Output = Customer;

  async fn transform(&self, mut customer: Customer) -> BatchResult<Option<Customer>> {
    customer.email = customer.email.trim().to_lowercase();
    Ok(Some(customer))
  }
}

// 3. A repository-style sink: save() per record, one transaction per chunk
#[derive(Clone, Default)]
struct CustomerRepository {
  rows: Arc<Mutex<HashMap<i32, Customer>>>,
}

impl CustomerRepository {
  fn save(&self, customer: &Customer) {
    self.rows.lock().insert(customer.id, customer.clone());
  }
}

#[async_trait]
impl ItemSink for CustomerRepository {
  type Item = Customer;

  async fn write(&self, chunk: &[Customer]) -> BatchResult<()> {
    for customer in chunk {
      self.save(customer);
    }
    Ok(())
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- CSV Import Example ---");

  // 4. Write a small fixture file for the demo
  let mut fixture = tempfile::NamedTempFile::new()?;
  writeln!(fixture, "id,firstName,lastName,email,country")?;
  for i in 1..=42 {
    writeln!(fixture, "{i},First{i},Last{i},  User{i}@Example.com ,DE")?;
  }
  fixture.flush()?;

  // 5. Source: delimited lines, header skipped, typed mapping per field
  let tokenizer = DelimitedLineTokenizer::comma_separated(&["id", "firstName", "lastName", "email", "country"]);
  let source = FlatFileSource::new(fixture.path(), tokenizer, |fields| {
    Ok(Customer {
      id: fields.read_parsed("id")?,
      first_name: fields.read_string("firstName")?.to_string(),
      last_name: fields.read_string("lastName")?.to_string(),
      email: fields.read_string("email")?.to_string(),
      country: fields.read_string("country")?.to_string(),
    })
  });

  // 6. One step, pooled across 4 workers, committed in chunks of 10
  let repository = CustomerRepository::default();
  let step = StepBuilder::new("csv-step")
    .chunk_size(10)
    .worker_pool_size(4)
    .build(source, NormalizeEmail, repository.clone())?;

  // 7. Wire the job and run it
  let ledger = Arc::new(InMemoryLedger::new());
  let job = JobBuilder::new("importCustomers")
    .ledger(ledger.clone())
    .start(Flow::new("importCustomersFlow").step(step))?;

  let execution = job.run().await;

  info!("Job '{}' finished: {:?}", execution.job_name, execution.status);
  for step_execution in &execution.step_executions {
    info!(
      "  step '{}': read={} written={} filtered={} ({} chunk commits)",
      step_execution.step_name,
      step_execution.read_count,
      step_execution.write_count,
      step_execution.filter_count,
      ledger.commit_count(),
    );
  }

  let rows = repository.rows.lock();
  info!("Repository now holds {} customers.", rows.len());
  assert_eq!(rows.len(), 42);
  assert_eq!(rows[&7].email, "user7@example.com");

  Ok(())
}
