pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGWINDOW CONFIGURATION
# =============================================================================
# logwindow reads log lines from a source, groups them into tumbling-window
# batches, and writes each batch as one JSON object per line.
#
# A batch closes when it holds max_batch_size records OR when max_window has
# elapsed since the previous batch, whichever comes first. Empty batches are
# never written.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logwindow/config.yml
#   3. /etc/logwindow/config.yml
#
# Values may reference environment variables with $env{NAME}.

# =============================================================================
# BATCHER
# =============================================================================

batcher:
  # Close a batch once it holds this many records
  max_batch_size: 100

  # Close a non-empty batch this long after the previous flush.
  # Units: ms, s, m, h
  max_window: 5s

  # How often an idle batcher re-checks for shutdown
  idle_poll_interval: 1s

  backpressure:
    # What happens when the ingest queue is full:
    #   block:        the reader waits for the batcher to catch up
    #   reject:       the record is refused and counted as rejected
    #   drop_newest:  the incoming record is discarded
    #   drop_oldest:  the oldest queued record is discarded
    strategy: block

    # Queue capacity. Remove this line for an unbounded queue.
    buffer_limit: 10000

# =============================================================================
# SOURCE
# =============================================================================

source:
  # Name attached to every record read from this source
  id: app

  # File to read, or '-' for stdin
  path: '-'

  # Keep reading a file after EOF until interrupted (not valid for stdin)
  follow: false

  # Ignore blank lines
  skip_empty_lines: true

# =============================================================================
# OUTPUT
# =============================================================================

output:
  # File to append batches to, or '-' for stdout
  path: '-'
"#
    .to_string()
}
