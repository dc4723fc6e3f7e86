/*!
# Student Dashboard

A browser-based dashboard where students look up their own monthly class hours,
built in Rust on top of a Google Sheets worksheet.

## Overview

Class sessions are recorded by staff in a shared spreadsheet, one row per
session. The dashboard reads that worksheet with a service account, cleans it
up, and lets a student find their rows for a month by entering their student ID
and part of their name. Matching rows are shown together with the month's total
hours and a per-subject breakdown.

## Architecture

### Data Layer
- **credentials**: Service-account key loading from a TOML secrets file
- **sheets**: Google Sheets v4 client behind the `SheetSource` trait
- **table**: Header resolution, forward-fill and hour coercion

### Logic Layer
- **report**: Criteria validation, row selection, total and per-subject hours
- **dashboard**: Per-session controller (Uninitialized, Loaded, Verified)

### Web Layer (feature `web`)
- **session**: Cookie-keyed session store with idle expiry
- **app**: axum routes and the single dashboard page

## REST API Endpoints

- `GET /` - The dashboard page, with its initial state embedded
- `GET /api/state` - Months, notices and the current summary
- `POST /api/verify` - Look a student up (`month`, `student_id`, `name`)
- `POST /api/refresh` - Re-fetch the worksheet for this session

Only `GET /` starts a session. API calls without a live session cookie get an
expired-session notice and never reach Google.

## Error Handling

Every failure is a [`DashboardError`]. Fetch failures leave an empty table in
the session and are shown as notices; lookups that match nothing always report
the same message, whichever field was wrong.
*/

pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod error;
pub mod report;
pub mod sheets;
pub mod table;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod session;

pub use config::{ColumnSchema, DashboardConfig};
pub use dashboard::{Dashboard, DashboardState};
pub use error::{DashboardError, Result, Severity};
pub use report::{FilterCriteria, StudentSummary};
pub use sheets::{GoogleSheetsClient, MemorySource, SheetSource};
pub use table::{Cell, Table};
