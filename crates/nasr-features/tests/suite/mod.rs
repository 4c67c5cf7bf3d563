mod facade;
