// ABOUTME: API module containing the HTTP handlers for the staffvax REST API.
// ABOUTME: Every route lives under /api/vaccine and talks only to the StaffStore trait.

pub mod vaccine;
