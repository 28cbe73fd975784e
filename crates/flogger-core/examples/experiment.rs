//! Logging a toy training loop with flogger-core.

use flogger_core::handlers::{EchoLast, LogLast, SaveJson, SaveParquet, SaveText, SaveYaml};
use flogger_core::{telemetry, Dispatcher, HandlerBinding, LoggerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing("info");

    // 1. Four handler workers writing under ./test_output
    let logger = Dispatcher::new(
        LoggerConfig::new()
            .with_name("toy-run")
            .with_root("./test_output")
            .with_workers(4),
    )?;

    // 2. Declare entries and what to do with their data
    logger.declare(
        "Loss",
        vec![HandlerBinding::new(EchoLast), HandlerBinding::new(SaveJson)],
        vec![HandlerBinding::new(SaveParquet)],
        vec![HandlerBinding::new(SaveText)],
    )?;
    logger.declare(
        "Weights/Histogram",
        vec![HandlerBinding::new(LogLast::default())],
        vec![HandlerBinding::new(SaveYaml)],
        vec![],
    )?;

    // 3. The experiment loop only pays for the enqueue
    for i in 0..100u64 {
        let x = i as f64 * 0.1;
        logger.push("Loss", i, (-x).exp())?;
        if i % 10 == 0 {
            logger.push_next("Weights/Histogram", vec![x.sin(), x.cos(), x.tanh()])?;
        }
    }
    let waited = logger.wait();
    println!("Handlers caught up after {:?}", waited);

    // 4. Checkpoint everything, then start the loss from scratch
    logger.dump()?;
    logger.reset("Loss")?;
    logger.wait();

    for failure in logger.drain_failures() {
        eprintln!("{}", failure);
    }
    println!("{:?}", logger.stats());

    logger.shutdown();
    Ok(())
}
